//! Community votes. Each user may support or dispute a report once, ever.

use civicwatch_common::{Report, VoteKind};

#[derive(Debug, Clone, PartialEq)]
pub enum VoteOutcome {
    Recorded(Report),
    /// The user already supported or disputed this report; nothing changed.
    AlreadyVoted,
    /// No signed-in user; the sign-in prompt was opened instead.
    AuthRequired,
}

/// Report with the vote applied, or `None` if `user_id` has already voted.
pub fn apply_vote(report: &Report, user_id: &str, kind: VoteKind) -> Option<Report> {
    if report.has_voted(user_id) {
        return None;
    }
    let mut next = report.clone();
    match kind {
        VoteKind::Support => {
            next.supported_by.push(user_id.to_string());
            next.support_count += 1;
        }
        VoteKind::Dispute => {
            next.disputed_by.push(user_id.to_string());
            next.dispute_count += 1;
        }
    }
    Some(next)
}
