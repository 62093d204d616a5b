use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid VLAN ID '{id}' on interface {iface}")]
    InvalidVlanId { iface: String, id: String },

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid interface pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(
        "Could not determine the base interface (no IPv4 default route). \
         Pass --base-interface explicitly."
    )]
    BaseInterfaceNotFound,

    #[error("Interface {0} has no IPv4 address")]
    NoAddress(String),

    #[error("No gateway could be resolved for interface {0}")]
    NoGateway(String),

    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Unexpected output from '{command}': {reason}")]
    MalformedOutput { command: String, reason: String },

    #[error("Applying network configuration failed: {0}")]
    ApplyFailed(String),
}
