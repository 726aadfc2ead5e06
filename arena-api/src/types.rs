//! Request and response DTOs

use arena_core::{AgentId, Division};
use serde::{Deserialize, Serialize};

/// POST /agents body (admin).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentRequest {
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub specializations: Vec<String>,
    /// Model identifier passed to the gateway.
    pub model_id: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub supports_structured_output: bool,
}

/// POST /matches/quick body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuickMatchRequest {
    pub division: Division,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub agent1_id: Option<AgentId>,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "uuid")]
    pub agent2_id: Option<AgentId>,
}

/// 429 body for the live-match cap, wire shape pinned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TooManyMatchesBody {
    /// Always "too_many_matches".
    pub error: String,
    pub message: String,
    pub live_match_count: usize,
    pub max_live_matches: usize,
}

/// GET /matches query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListMatchesQuery {
    pub status: Option<arena_core::MatchStatus>,
}

/// POST /tournament/start query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentStartQuery {
    pub num_rounds: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quick_match_request_shape() {
        let request: QuickMatchRequest =
            serde_json::from_str(r#"{ "division": "novice" }"#).unwrap();
        assert_eq!(request.division, Division::Novice);
        assert!(request.agent1_id.is_none());

        let json = serde_json::to_string(&QuickMatchRequest {
            division: Division::Expert,
            agent1_id: None,
            agent2_id: None,
        })
        .unwrap();
        assert!(json.contains("\"division\":\"expert\""));
    }

    #[test]
    fn test_too_many_body_shape() {
        let body = TooManyMatchesBody {
            error: "too_many_matches".to_string(),
            message: "Arena is at capacity".to_string(),
            live_match_count: 1,
            max_live_matches: 1,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "too_many_matches");
        assert_eq!(json["live_match_count"], 1);
        assert_eq!(json["max_live_matches"], 1);
    }

    #[test]
    fn test_tournament_query_uses_camel_case() {
        let query: TournamentStartQuery =
            serde_json::from_str(r#"{ "numRounds": 3 }"#).unwrap();
        assert_eq!(query.num_rounds, Some(3));
    }
}
