use callcoach::recognizer::{
    RecognitionControlMessage, RecognitionResultMessage, RecognitionStatusMessage,
    RecognizerErrorCode,
};

#[test]
fn test_result_message_serialization() {
    let msg = RecognitionResultMessage {
        session_id: "test-call".to_string(),
        index: 3,
        text: "hello world".to_string(),
        confidence: Some(0.95),
        is_final: false,
        timestamp: "2026-08-06T14:30:00Z".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("test-call"));
    assert!(json.contains("\"final\":false"));
    assert!(json.contains("\"index\":3"));

    let deserialized: RecognitionResultMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.session_id, "test-call");
    assert_eq!(deserialized.index, 3);
    assert_eq!(deserialized.text, "hello world");
    assert!(!deserialized.is_final);
}

#[test]
fn test_result_message_without_confidence() {
    let json = r#"{
        "session_id": "test-call",
        "index": 0,
        "text": "hello",
        "confidence": null,
        "final": true,
        "timestamp": "2026-08-06T14:30:05Z"
    }"#;

    let msg: RecognitionResultMessage = serde_json::from_str(json).unwrap();
    assert!(msg.confidence.is_none());
    assert!(msg.is_final);
}

#[test]
fn test_status_message_deserialization() {
    let json = r#"{
        "session_id": "test-call",
        "status": "error",
        "error": "network"
    }"#;

    let msg: RecognitionStatusMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.status, "error");
    assert_eq!(msg.error.as_deref(), Some("network"));
}

#[test]
fn test_status_message_error_field_defaults_to_none() {
    let json = r#"{
        "session_id": "test-call",
        "status": "ended"
    }"#;

    let msg: RecognitionStatusMessage = serde_json::from_str(json).unwrap();
    assert_eq!(msg.status, "ended");
    assert!(msg.error.is_none());
}

#[test]
fn test_control_message_serialization() {
    let msg = RecognitionControlMessage {
        session_id: "test-call".to_string(),
        command: "start".to_string(),
        timestamp: "2026-08-06T14:30:00Z".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"command\":\"start\""));

    let deserialized: RecognitionControlMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.command, "start");
}

#[test]
fn test_error_code_parse_round_trip() {
    for code in ["not-allowed", "no-speech", "network", "aborted"] {
        assert_eq!(RecognizerErrorCode::parse(code).as_str(), code);
    }

    let other = RecognizerErrorCode::parse("audio-capture");
    assert_eq!(other, RecognizerErrorCode::Other("audio-capture".to_string()));
    assert_eq!(other.as_str(), "audio-capture");
}
