#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::error::*;
    use crate::event::*;
    use crate::request::*;
    use crate::session::*;
    use crate::turn::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    // ─── Turn Tests ──────────────────────────────────────────

    #[test]
    fn test_user_turn_is_complete() {
        let turn = Turn::user("Hello", Utc::now());
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text, "Hello");
        assert_eq!(turn.status, TurnStatus::Complete);
    }

    #[test]
    fn test_assistant_placeholder_is_pending() {
        let turn = Turn::assistant_placeholder(Utc::now());
        assert_eq!(turn.role, Role::Assistant);
        assert!(turn.text.is_empty());
        assert_eq!(turn.status, TurnStatus::Pending);
    }

    #[test]
    fn test_turn_ids_are_unique() {
        let a = Turn::user("a", Utc::now());
        let b = Turn::user("a", Utc::now());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_turn_status_terminal() {
        assert!(!TurnStatus::Pending.is_terminal());
        assert!(!TurnStatus::Streaming.is_terminal());
        assert!(TurnStatus::Complete.is_terminal());
        assert!(TurnStatus::Failed.is_terminal());
        assert!(TurnStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_next_timestamp_never_goes_backwards() {
        let now = Utc::now();
        let later = now + Duration::seconds(30);
        let transcript = vec![Turn::user("x", later)];
        assert_eq!(next_timestamp(&transcript, now), later);
        assert_eq!(next_timestamp(&[], now), now);

        let earlier = vec![Turn::user("x", now - Duration::seconds(1))];
        assert_eq!(next_timestamp(&earlier, now), now);
    }

    #[test]
    fn test_turn_status_serialization() {
        let json = serde_json::to_string(&TurnStatus::Streaming).unwrap();
        assert_eq!(json, r#""streaming""#);
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, r#""assistant""#);
    }

    // ─── StreamEvent Tests ───────────────────────────────────

    #[test]
    fn test_parse_session_event() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"session","session_id":"s1"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::SessionStarted {
                session_id: "s1".to_string()
            }
        );
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_parse_chunk_event() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"chunk","content":"Photo"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::ContentChunk {
                content: "Photo".to_string()
            }
        );
        assert_eq!(event.kind(), "chunk");
    }

    #[test]
    fn test_parse_done_event_with_nulls() {
        let raw = r#"{"type":"done","message_id":"m1","model":null,"prompt_tokens":12,
            "completion_tokens":null,"total_tokens":40,"tool_calls":[]}"#;
        let event: StreamEvent = serde_json::from_str(raw).unwrap();
        match event {
            StreamEvent::Completed(meta) => {
                assert_eq!(meta.message_id, "m1");
                assert!(meta.model.is_none());
                assert_eq!(meta.prompt_tokens, Some(12));
                assert!(meta.completion_tokens.is_none());
                assert_eq!(meta.total_tokens, Some(40));
                assert!(meta.tool_calls.is_empty());
            }
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_parse_done_event_minimal() {
        let event: StreamEvent = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert!(event.is_terminal());
        assert_eq!(event, StreamEvent::Completed(CompletionMetadata::default()));
    }

    #[test]
    fn test_parse_error_event() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"error","error":"rate limited","code":"429"}"#)
                .unwrap();
        assert_eq!(
            event,
            StreamEvent::Failed {
                error: "rate limited".to_string(),
                code: Some("429".to_string()),
            }
        );
        assert!(event.is_terminal());

        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"error","error":"boom"}"#).unwrap();
        if let StreamEvent::Failed { code, .. } = event {
            assert!(code.is_none());
        } else {
            panic!("Wrong variant");
        }
    }

    #[test]
    fn test_parse_tool_call_event() {
        let event: StreamEvent = serde_json::from_str(
            r#"{"type":"tool_call","tool_name":"search","tool_input":{"q":"cells"}}"#,
        )
        .unwrap();
        if let StreamEvent::ToolInvoked {
            tool_name,
            tool_input,
        } = event
        {
            assert_eq!(tool_name, "search");
            assert_eq!(tool_input["q"], "cells");
        } else {
            panic!("Wrong variant");
        }
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let result = serde_json::from_str::<StreamEvent>(r#"{"type":"ping"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_exchange_status_activity() {
        assert!(!ExchangeStatus::Idle.is_active());
        assert!(ExchangeStatus::Dispatched.is_active());
        assert!(ExchangeStatus::SessionPending.is_active());
        assert!(ExchangeStatus::Streaming.is_active());
        assert!(!ExchangeStatus::Settled.is_active());
        assert!(!ExchangeStatus::Failed.is_active());
        assert!(!ExchangeStatus::Cancelled.is_active());
        assert!(ExchangeStatus::Cancelled.is_terminal());
        assert!(!ExchangeStatus::Idle.is_terminal());
    }

    // ─── Request Tests ───────────────────────────────────────

    #[test]
    fn test_create_request_shape() {
        let req = ChatRequest::Create {
            subject_id: None,
            topic_id: Some("t1".to_string()),
            feature: "routing_disabled".to_string(),
            message: "Explain photosynthesis".to_string(),
        };
        assert_eq!(req.path(), "/chat/sessions");
        assert_eq!(req.kind(), "create");
        assert_eq!(
            req.body(),
            json!({
                "subject_id": null,
                "topic_id": "t1",
                "feature": "routing_disabled",
                "message": "Explain photosynthesis",
            })
        );
        assert_eq!(req.message(), "Explain photosynthesis");
    }

    #[test]
    fn test_continue_request_shape() {
        let req = ChatRequest::Continue {
            session_id: "s1".to_string(),
            message: "Give an example".to_string(),
        };
        assert_eq!(req.path(), "/chat/sessions/s1/messages");
        assert_eq!(req.kind(), "continue");
        assert_eq!(req.body(), json!({ "message": "Give an example" }));
        assert_eq!(req.failure_context(), "Failed to send message");
    }

    // ─── Config Tests ────────────────────────────────────────

    #[test]
    fn test_default_config() {
        let config = ChatConfig::default();
        assert!(config.api.base_url.is_empty());
        assert!(config.api.include_credentials);
        assert_eq!(config.feature.tool_id, DEFAULT_TOOL_ID);
        assert_eq!(config.feature.subject, SubjectFilter::All);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_feature_name_for_all_subjects() {
        let selection = FeatureSelection {
            tool_id: "explain".to_string(),
            subject: SubjectFilter::All,
        };
        assert_eq!(selection.feature_name(), "explain");
    }

    #[test]
    fn test_feature_name_for_single_subject_uses_rag() {
        let selection = FeatureSelection {
            tool_id: "explain".to_string(),
            subject: SubjectFilter::Subject("Biology".to_string()),
        };
        assert_eq!(selection.feature_name(), "explain_rag");
    }

    #[test]
    fn test_config_from_partial_json() {
        let config =
            ChatConfig::from_json(r#"{"api":{"base_url":"https://api.example.com/"}}"#).unwrap();
        assert_eq!(config.api.base_url, "https://api.example.com/");
        assert!(config.api.include_credentials);
        assert_eq!(config.create_feature(), DEFAULT_TOOL_ID);
    }

    #[test]
    fn test_config_from_empty_json() {
        assert_eq!(ChatConfig::from_json("  ").unwrap(), ChatConfig::default());
    }

    #[test]
    fn test_config_from_invalid_json() {
        let err = ChatConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_build_url() {
        let api = ApiConfig {
            base_url: "https://api.example.com//".to_string(),
            include_credentials: true,
        };
        assert_eq!(
            api.build_url("/chat/sessions"),
            "https://api.example.com/chat/sessions"
        );
        assert_eq!(
            api.build_url("chat/sessions"),
            "https://api.example.com/chat/sessions"
        );
        assert_eq!(ApiConfig::default().build_url("/chat"), "/chat");
    }

    // ─── Session Tests ───────────────────────────────────────

    #[test]
    fn test_session_establish_once() {
        let mut session = Session::new();
        assert_eq!(session.id, None);
        assert!(session.establish("s1"));
        assert!(session.started_at.is_some());
        assert!(!session.establish("s2"));
        assert_eq!(session.id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_snapshot_busy() {
        let snapshot = ConversationSnapshot {
            transcript: Vec::new(),
            status: ExchangeStatus::Streaming,
            session_id: None,
            last_completion: None,
        };
        assert!(snapshot.is_busy());
    }

    // ─── Error Tests ─────────────────────────────────────────

    #[test]
    fn test_error_display() {
        let err = ChatError::transport(Some(502), "Failed to create session: Bad Gateway");
        assert_eq!(
            err.to_string(),
            "Transport error (HTTP 502): Failed to create session: Bad Gateway"
        );

        let err = ChatError::transport(None, "stream closed before completion");
        assert_eq!(
            err.to_string(),
            "Transport error: stream closed before completion"
        );

        assert_eq!(ChatError::Cancelled.to_string(), "Cancelled");
        assert_eq!(SendRejected::Busy.to_string(), "an exchange is already in flight");
    }

    #[test]
    fn test_error_user_message() {
        let err = ChatError::Protocol {
            reason: "model overloaded".to_string(),
            code: None,
        };
        assert_eq!(err.user_message(), "model overloaded");
        assert_eq!(
            ChatError::transport(Some(500), "Failed to send message").user_message(),
            "Failed to send message"
        );
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{{invalid}}").unwrap_err();
        let chat_err: ChatError = serde_err.into();
        assert!(matches!(chat_err, ChatError::Serialization(_)));
    }
}
