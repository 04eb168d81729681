//! Static mock teams served by the dashboard routes.

use serde::{Deserialize, Serialize};

/// A team on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub lead: String,
    pub members: u32,
    pub focus: String,
}

impl Team {
    fn new(id: &str, name: &str, lead: &str, members: u32, focus: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            lead: lead.to_string(),
            members,
            focus: focus.to_string(),
        }
    }
}

/// One day of repository activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDay {
    pub date: String,
    pub commits: u32,
    pub prs: u32,
    pub issues: u32,
}

/// Every team, in display order
pub fn all() -> Vec<Team> {
    vec![
        Team::new("backend", "Backend Team", "Sarah Chen", 10, "API v3 Migration"),
        Team::new("frontend", "Frontend Team", "Mike Johnson", 8, "Dashboard Redesign"),
        Team::new("mobile", "Mobile Team", "Lisa Wang", 6, "iOS App Launch"),
        Team::new("devops", "DevOps Team", "Tom Brown", 5, "Infrastructure Upgrade"),
    ]
}

/// Look up a team by id
pub fn find(team_id: &str) -> Option<Team> {
    all().into_iter().find(|team| team.id == team_id)
}

/// Recent activity rows.
///
/// The rows are the same for every id, including ids with no team.
pub fn activity(_team_id: &str) -> Vec<ActivityDay> {
    [("2024-01-10", 23, 5, 12), ("2024-01-11", 18, 3, 8), ("2024-01-12", 31, 7, 15)]
        .into_iter()
        .map(|(date, commits, prs, issues)| ActivityDay {
            date: date.to_string(),
            commits,
            prs,
            issues,
        })
        .collect()
}
