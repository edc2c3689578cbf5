use marketplace_portal::models::{
    AnswerEntry, AnswerScalar, AnswerValue, CreateReviewRequest, RegisterUserRequest, Role,
    SubmitAnswersResponse,
};
use marketplace_portal::presence::{PresenceStatus, TrackPresenceRequest};

// --- Roles ---

#[test]
fn test_role_parse_is_case_insensitive_and_trimmed() {
    assert_eq!("customer".parse::<Role>(), Ok(Role::Customer));
    assert_eq!("Professional".parse::<Role>(), Ok(Role::Professional));
    assert_eq!("  CUSTOMER\n".parse::<Role>(), Ok(Role::Customer));
}

#[test]
fn test_role_parse_rejects_unknown_roles() {
    assert!("admin".parse::<Role>().is_err());
    assert!("".parse::<Role>().is_err());
    assert!("customers".parse::<Role>().is_err());
}

#[test]
fn test_role_json_is_lowercase() {
    assert_eq!(serde_json::to_string(&Role::Professional).unwrap(), r#""professional""#);

    let req: RegisterUserRequest = serde_json::from_str(
        r#"{"email":"a@example.com","password":"hunter22","role":"customer"}"#,
    )
    .unwrap();
    assert_eq!(req.role, Role::Customer);
}

// --- Answers ---

#[test]
fn test_answer_entry_accepts_scalar_and_list() {
    let entries: Vec<AnswerEntry> = serde_json::from_str(
        r#"[
            {"form_id": 1, "service_id": 10, "answer": "weekends only"},
            {"form_id": 2, "service_id": 10, "answer": ["boilers", "radiators"]}
        ]"#,
    )
    .unwrap();

    assert_eq!(entries[0].answer, AnswerValue::text("weekends only"));
    assert_eq!(entries[1].answer, AnswerValue::texts(["boilers", "radiators"]));
}

#[test]
fn test_answer_entry_accepts_numbers_and_booleans() {
    let entries: Vec<AnswerEntry> = serde_json::from_str(
        r#"[
            {"form_id": 1, "service_id": 10, "answer": 42},
            {"form_id": 2, "service_id": 10, "answer": 2.5},
            {"form_id": 3, "service_id": 10, "answer": false}
        ]"#,
    )
    .unwrap();

    assert_eq!(entries[0].answer, AnswerValue::Scalar(AnswerScalar::Integer(42)));
    assert_eq!(entries[1].answer, AnswerValue::Scalar(AnswerScalar::Float(2.5)));
    assert_eq!(entries[2].answer, AnswerValue::Scalar(AnswerScalar::Bool(false)));
}

#[test]
fn test_answer_entry_rejects_null_and_objects() {
    for answer in ["null", r#"{"a": 1}"#, r#"[{"a": 1}]"#] {
        let json = format!(r#"{{"form_id": 1, "service_id": 10, "answer": {answer}}}"#);
        assert!(serde_json::from_str::<AnswerEntry>(&json).is_err(), "{answer}");
    }
}

#[test]
fn test_answer_value_storage_encoding() {
    let scalar = AnswerValue::text("as-is, \"quoted\"");
    assert_eq!(scalar.to_stored().unwrap(), "as-is, \"quoted\"");

    let list = AnswerValue::texts(["a", "b c"]);
    assert_eq!(list.to_stored().unwrap(), r#"["a","b c"]"#);

    assert_eq!(AnswerValue::Scalar(AnswerScalar::Integer(7)).to_stored().unwrap(), "7");
    assert_eq!(AnswerValue::Scalar(AnswerScalar::Float(2.5)).to_stored().unwrap(), "2.5");
    assert_eq!(AnswerValue::Scalar(AnswerScalar::Bool(true)).to_stored().unwrap(), "true");

    assert_eq!(AnswerValue::List(vec![]).to_stored().unwrap(), "[]");
}

#[test]
fn test_submit_response_omits_error_on_success() {
    let ok = SubmitAnswersResponse {
        success: true,
        error: None,
    };
    assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"success":true}"#);

    let failed = SubmitAnswersResponse {
        success: false,
        error: Some("Provider not found".to_string()),
    };
    assert_eq!(
        serde_json::to_string(&failed).unwrap(),
        r#"{"success":false,"error":"Provider not found"}"#
    );
}

// --- Other payloads ---

#[test]
fn test_review_comment_defaults_to_empty() {
    let req: CreateReviewRequest = serde_json::from_str(r#"{"rating": 4}"#).unwrap();
    assert_eq!(req.rating, 4);
    assert!(req.comment.is_empty());
}

#[test]
fn test_track_presence_status_defaults_to_online() {
    let req: TrackPresenceRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(req.status, PresenceStatus::Online);

    let req: TrackPresenceRequest = serde_json::from_str(r#"{"status":"busy"}"#).unwrap();
    assert_eq!(req.status, PresenceStatus::Busy);
}
