use std::fmt;

/// Lifecycle of a rule within one evaluation session.
///
/// ```text
/// Waiting -> Testing -> TestTrue -> Applying -> Applied
///                    \-> TestFalse           \-> ApplyFailed
///                    \-> TestFailed
/// ```
///
/// `TestFalse`, `TestFailed`, `Applied` and `ApplyFailed` are terminal. A
/// status never goes back to `Waiting` once it has left it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleStatus {
    Waiting,
    Testing,
    TestTrue,
    TestFalse,
    TestFailed,
    Applying,
    Applied,
    ApplyFailed,
}

impl RuleStatus {
    /// No further transition can happen from this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::TestFalse | Self::TestFailed | Self::Applied | Self::ApplyFailed
        )
    }

    /// The condition has already been settled as `true`.
    #[must_use]
    pub fn condition_holds(self) -> bool {
        matches!(
            self,
            Self::TestTrue | Self::Applying | Self::Applied | Self::ApplyFailed
        )
    }

    #[must_use]
    pub fn is_failed(self) -> bool {
        matches!(self, Self::TestFailed | Self::ApplyFailed)
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "WAITING",
            Self::Testing => "TESTING",
            Self::TestTrue => "TEST_TRUE",
            Self::TestFalse => "TEST_FALSE",
            Self::TestFailed => "TEST_FAILED",
            Self::Applying => "APPLYING",
            Self::Applied => "APPLIED",
            Self::ApplyFailed => "APPLY_FAILED",
        };
        f.write_str(name)
    }
}
