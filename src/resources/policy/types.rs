//! Well known branch policy type ids.

use uuid::{Uuid, uuid};

/// Identifies a branch policy type on the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyType {
    MinReviewerCount,
    BuildValidation,
    AutoReviewers,
    WorkItemLinking,
    CommentResolution,
    MergeTypes,
    StatusCheck,
}

impl PolicyType {
    pub const ALL: [PolicyType; 7] = [
        PolicyType::MinReviewerCount,
        PolicyType::BuildValidation,
        PolicyType::AutoReviewers,
        PolicyType::WorkItemLinking,
        PolicyType::CommentResolution,
        PolicyType::MergeTypes,
        PolicyType::StatusCheck,
    ];

    pub const fn id(self) -> Uuid {
        match self {
            PolicyType::MinReviewerCount => uuid!("fa4e907d-c16b-4a4c-9dfa-4906e5d171dd"),
            PolicyType::BuildValidation => uuid!("0609b952-1397-4640-95ec-e00a01b2c241"),
            PolicyType::AutoReviewers => uuid!("fd2167ab-b0be-447a-8ec8-39368250530e"),
            PolicyType::WorkItemLinking => uuid!("40e92b44-2fe1-4dd6-b3d8-74a9c21d0c6e"),
            PolicyType::CommentResolution => uuid!("c6a1889d-b943-4856-b76f-9e46bb6b0df2"),
            PolicyType::MergeTypes => uuid!("fa4e907d-c16b-4a4c-9dfa-4916e5d171ab"),
            PolicyType::StatusCheck => uuid!("cbdc66da-9728-4af8-aada-9a5a32e4a226"),
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            PolicyType::MinReviewerCount => "Minimum number of reviewers",
            PolicyType::BuildValidation => "Build",
            PolicyType::AutoReviewers => "Required reviewers",
            PolicyType::WorkItemLinking => "Work item linking",
            PolicyType::CommentResolution => "Comment requirements",
            PolicyType::MergeTypes => "Require a merge strategy",
            PolicyType::StatusCheck => "Status",
        }
    }

    pub fn from_id(id: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.id() == id)
    }
}
