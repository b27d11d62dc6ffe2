//! Replica set status as reported by `replSetGetStatus`.

/// Member state codes the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberState {
    Primary,
    Secondary,
    Arbiter,
    /// Any other state code (startup, recovering, rollback, ...).
    Other(i32),
}

impl MemberState {
    /// Numeric state code as used by the server.
    pub fn code(&self) -> i32 {
        match self {
            MemberState::Primary => 1,
            MemberState::Secondary => 2,
            MemberState::Arbiter => 7,
            MemberState::Other(code) => *code,
        }
    }
}

impl From<i32> for MemberState {
    fn from(code: i32) -> Self {
        match code {
            1 => MemberState::Primary,
            2 => MemberState::Secondary,
            7 => MemberState::Arbiter,
            other => MemberState::Other(other),
        }
    }
}

impl Default for MemberState {
    fn default() -> Self {
        MemberState::Other(0)
    }
}

/// One replica set member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplMember {
    /// `host:port` as configured in the replica set.
    pub name: String,
    pub state: MemberState,
    /// Seconds component of the member's applied optime.
    pub optime_secs: i64,
}

impl ReplMember {
    /// Create a member.
    pub fn new(name: impl Into<String>, state: MemberState, optime_secs: i64) -> Self {
        Self {
            name: name.into(),
            state,
            optime_secs,
        }
    }

    /// Short display name: host up to the first dot, followed by `:port`.
    ///
    /// Names without a dot or a port are returned unchanged.
    pub fn short_name(&self) -> String {
        match (self.name.find('.'), self.name.rfind(':')) {
            (Some(dot), Some(colon)) if dot < colon => {
                format!("{}{}", &self.name[..dot], &self.name[colon..])
            }
            _ => self.name.clone(),
        }
    }
}

/// One `replSetGetStatus` document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplSetStatus {
    /// Status `date`, milliseconds since the Unix epoch.
    pub date_ms: i64,
    pub members: Vec<ReplMember>,
}

impl ReplSetStatus {
    /// Create a status document.
    pub fn new(date_ms: i64, members: Vec<ReplMember>) -> Self {
        Self { date_ms, members }
    }

    /// Applied optime of the current primary, if there is one.
    pub fn primary_optime(&self) -> Option<i64> {
        self.members
            .iter()
            .find(|m| m.state == MemberState::Primary)
            .map(|m| m.optime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes_round_trip() {
        for code in [1, 2, 7, 3, 8] {
            assert_eq!(MemberState::from(code).code(), code);
        }
    }

    #[test]
    fn short_name_strips_domain() {
        let m = ReplMember::new("db1.example.com:27017", MemberState::Primary, 0);
        assert_eq!(m.short_name(), "db1:27017");
    }

    #[test]
    fn short_name_keeps_plain_names() {
        let m = ReplMember::new("localhost:27017", MemberState::Secondary, 0);
        assert_eq!(m.short_name(), "localhost:27017");
    }

    #[test]
    fn primary_optime_absent_without_primary() {
        let s = ReplSetStatus::new(
            0,
            vec![ReplMember::new("a:1", MemberState::Secondary, 10)],
        );
        assert_eq!(s.primary_optime(), None);
    }
}
