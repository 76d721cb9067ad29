use crate::state::{CrawlState, CursorState};

/// What the scheduler does with one server during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStep {
    Search {
        server: String,
        cursor: Option<String>,
    },
    /// Exhausted server: no network call, counted as completed immediately.
    Skip { server: String },
}

/// Steps for the next pass over `state`, in server order.
pub fn plan_pass(state: &CrawlState) -> Vec<ServerStep> {
    state
        .servers
        .iter()
        .map(|server| match state.cursor(server) {
            CursorState::Fresh => ServerStep::Search {
                server: server.clone(),
                cursor: None,
            },
            CursorState::Resume(cursor) => ServerStep::Search {
                server: server.clone(),
                cursor: Some(cursor.to_string()),
            },
            CursorState::Exhausted => ServerStep::Skip {
                server: server.clone(),
            },
        })
        .collect()
}
