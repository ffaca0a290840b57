/// Exit codes used across the seal subcommands.
///
/// Mapping:
///   0 — success
///   1 — any error, including a verify pass finding a non-identical diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
}

impl From<ExitCode> for u8 {
    fn from(code: ExitCode) -> u8 {
        code as u8
    }
}
