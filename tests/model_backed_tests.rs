mod common;

use common::{client, spawn_mock, MockGroq};
use drbot::analysis::report::ReportSource;
use drbot::storage::ImageStore;
use drbot::{AnalysisJob, ChatService, ImageSource, Resolution, ScalpAnalyzer};

use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

const ASSESSMENT: &str = r#"```json
{"primary_diagnosis": "Seborrheic Dermatitis", "confidence": 0.82, "severity": "Mild",
 "treatments": ["Ketoconazole shampoo", "Gentle cleansing"]}
```"#;

fn scalp_png() -> Vec<u8> {
    let image = RgbImage::from_fn(448, 448, |x, _| {
        if x < 224 {
            Rgb([200, 170, 150])
        } else {
            Rgb([30, 25, 20])
        }
    });
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

#[tokio::test]
async fn test_analyzer_reports_model_assessment() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("scalp.png"), scalp_png()).unwrap();

    let mock = MockGroq::answering(ASSESSMENT);
    let url = spawn_mock(mock.clone()).await;
    let analyzer = ScalpAnalyzer::with_client(client(url), ImageStore::new(dir.path()), 1 << 20);

    let job = AnalysisJob::new(ImageSource::Path("scalp.png".to_string()), None, false);
    let outcome = analyzer.analyze(job).await.unwrap();

    assert_eq!(outcome.resolution, Resolution::Analyzed);
    let report = outcome.report.unwrap();
    assert_eq!(report.source, ReportSource::Model);
    assert_eq!(report.primary_diagnosis, "Seborrheic Dermatitis");
    assert_eq!(report.treatments[0].name, "Ketoconazole shampoo");

    let body = mock.last_body();
    assert_eq!(body["max_tokens"], 1500);
    assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    let image_part = &body["messages"][0]["content"][1];
    assert_eq!(image_part["type"], "image_url");
    assert!(image_part["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_rejected_photo_never_reaches_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([5, 5, 5])))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.path().join("dark.png"), buf.into_inner()).unwrap();

    let mock = MockGroq::answering(ASSESSMENT);
    let url = spawn_mock(mock.clone()).await;
    let analyzer = ScalpAnalyzer::with_client(client(url), ImageStore::new(dir.path()), 1 << 20);

    let job = AnalysisJob::new(ImageSource::Path("dark.png".to_string()), None, false);
    let outcome = analyzer.analyze(job).await.unwrap();

    assert_eq!(outcome.resolution, Resolution::Rejected);
    assert!(outcome.report.is_none());
    assert_eq!(mock.hits(), 0);
}

#[tokio::test]
async fn test_doc_bot_sends_prompt_and_keeps_reply() {
    let mock = MockGroq::answering("How long has your scalp been itchy?");
    let url = spawn_mock(mock.clone()).await;
    let chat = ChatService::new(client(url), 4);
    let id = chat.start_session().await;

    let reply = chat.send(id, "hi").await.unwrap();
    assert_eq!(reply.message, "How long has your scalp been itchy?");
    assert_eq!(reply.turns, 2);

    let body = mock.last_body();
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("Doc Bot"));
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "hi");

    let session = chat.session(id).await.unwrap();
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_doc_bot_history_stays_bounded() {
    let mock = MockGroq::answering("Tell me more.");
    let url = spawn_mock(mock.clone()).await;
    let chat = ChatService::new(client(url), 4);
    let id = chat.start_session().await;

    for message in ["first", "second", "third"] {
        chat.send(id, message).await.unwrap();
    }

    let session = chat.session(id).await.unwrap();
    assert_eq!(session.history().len(), 4);

    // System prompt plus the four most recent turns, oldest user turn gone.
    let body = mock.last_body();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "Tell me more.");
    assert_eq!(messages[4]["content"], "third");
    assert!(messages.iter().all(|m| m["content"] != "first"));
}

#[tokio::test]
async fn test_assistant_prompt_names_detected_symptoms() {
    let mock = MockGroq::answering("Itching often comes from dryness.");
    let url = spawn_mock(mock.clone()).await;
    let chat = ChatService::new(client(url), 10);

    let reply = chat.ask_assistant("my scalp is itchy").await.unwrap();
    assert!(!reply.fallback);
    assert_eq!(reply.detected_symptoms, ["itching"]);
    assert_eq!(reply.message, "Itching often comes from dryness.");

    let body = mock.last_body();
    assert!(body["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("The user mentioned these symptoms: itching"));
    assert_eq!(body["messages"][1]["content"], "my scalp is itchy");
}
