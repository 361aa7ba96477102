//! Cisco IOS command vocabulary.
//!
//! ```text
//! router>                    # user EXEC
//! router#                    # privileged EXEC
//! router(config)#            # global configuration
//! router(config-line)#       # submode
//! ```

/// Width of the IOS terminal line; longer commands wrap in the echo.
pub const LINE_WIDTH: usize = 78;

/// Output markers that mean IOS rejected the command.
pub const FAILURE_MARKERS: [&str; 5] = [
    "% Invalid input detected",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
    "% Bad IP address",
];

/// Enter global configuration mode.
pub const CONFIGURE_TERMINAL: &str = "configure terminal";

/// Save the running configuration.
pub const WRITE_MEMORY: &str = "write memory";

/// Show the running configuration.
pub const SHOW_RUNNING_CONFIG: &str = "show run";

/// Show the running configuration from configuration mode.
pub const DO_SHOW_RUNNING_CONFIG: &str = "do show run";

/// Disable paging.
pub const TERMINAL_LENGTH_ZERO: &str = "terminal length 0";

/// Leave the current mode.
pub const EXIT: &str = "exit";

/// First failure marker found in `output`, in [`FAILURE_MARKERS`] order.
pub fn detect_failure(output: &str) -> Option<&'static str> {
    FAILURE_MARKERS
        .iter()
        .find(|marker| output.contains(*marker))
        .copied()
}
