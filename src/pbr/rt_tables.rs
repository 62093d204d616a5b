/// The `rt_tables` registry: `<id> <name>` per line, `#` comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtTables {
    entries: Vec<(u32, String)>,
}

impl RtTables {
    pub fn parse(contents: &str) -> Self {
        let entries = contents
            .lines()
            .filter_map(|line| {
                let line = line.split('#').next()?.trim();
                let mut parts = line.split_whitespace();
                let id = parts.next()?.parse().ok()?;
                let name = parts.next()?;
                Some((id, name.to_string()))
            })
            .collect();
        Self { entries }
    }

    pub fn contains_id(&self, id: u32) -> bool {
        self.entries.iter().any(|(i, _)| *i == id)
    }

    pub fn name_for(&self, id: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, n)| n.as_str())
    }

    pub fn id_for(&self, name: &str) -> Option<u32> {
        self.entries.iter().find(|(_, n)| n == name).map(|(i, _)| *i)
    }

    /// Line to append for a new table, or `None` when the number is taken.
    ///
    /// Records the entry so a second registration in the same run is also
    /// refused.
    pub fn register(&mut self, id: u32, name: &str) -> Option<String> {
        if self.contains_id(id) {
            return None;
        }
        self.entries.push((id, name.to_string()));
        Some(format!("{} {}", id, name))
    }
}
