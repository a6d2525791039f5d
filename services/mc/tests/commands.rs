//! End-to-end command tests against a mocked REST server and a scripted
//! in-process event socket.

use futures_util::{SinkExt, StreamExt};
use misty_cli::commands::{
    App, Commands, EXIT_FAILURE, EXIT_INTERRUPTED, EXIT_OK, EXIT_STREAM_CLOSED,
};
use misty_core::{HttpRobotApi, WsConnector};
use misty_types::EventType;
use serde_json::{Value, json};
use std::future::{Future, pending};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

type RobotSocket = WebSocketStream<TcpStream>;
type TestApp = App<HttpRobotApi, WsConnector, Vec<u8>>;

async fn spawn_robot<F, Fut>(script: F) -> String
where
    F: FnOnce(RobotSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        script(ws).await;
    });
    addr.to_string()
}

async fn read_control_frames(ws: &mut RobotSocket, count: usize) -> Vec<Value> {
    let mut frames = Vec::new();
    while frames.len() < count {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => frames.push(serde_json::from_str(&text).unwrap()),
            Some(Ok(_)) => continue,
            _ => break,
        }
    }
    frames
}

fn event(event_name: &str, message: Value) -> Message {
    Message::Text(
        json!({ "eventName": event_name, "message": message })
            .to_string()
            .into(),
    )
}

fn state_change(action: &str) -> Message {
    event(
        "SkillSystemStateChange",
        json!({ "action": action, "guid": "g", "name": "look-around", "timestamp": "t" }),
    )
}

fn app(server: &MockServer, ws_addr: &str, skills_path: PathBuf) -> TestApp {
    App::new(
        HttpRobotApi::with_base_url(format!("{}/api", server.uri())),
        WsConnector::new(ws_addr),
        skills_path,
        Vec::new(),
    )
}

fn output(app: &TestApp) -> String {
    String::from_utf8(app.output().clone()).unwrap()
}

async fn mock_skills(server: &MockServer, skills: Value) {
    Mock::given(method("GET"))
        .and(path("/api/skills"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": skills })))
        .mount(server)
        .await;
}

async fn mock_start(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path("/api/skills/start"))
        .and(body_json(json!({ "Skill": id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_run_prints_events_until_stopped() {
    let server = MockServer::start().await;
    mock_skills(&server, json!([{ "name": "look-around", "uniqueId": "abc" }])).await;
    mock_start(&server, "abc").await;

    let (frames_tx, frames_rx) = oneshot::channel();
    let ws_addr = spawn_robot(move |mut ws| async move {
        let subscribes = read_control_frames(&mut ws, 2).await;
        ws.send(event("SkillData", json!("hello"))).await.unwrap();
        ws.send(event(
            "SkillData",
            json!({ "message": "Debug => look", "data": "left" }),
        ))
        .await
        .unwrap();
        ws.send(state_change("Running")).await.unwrap();
        ws.send(state_change("Stopped")).await.unwrap();
        let unsubscribes = read_control_frames(&mut ws, 2).await;
        let _ = frames_tx.send((subscribes, unsubscribes));
    })
    .await;

    let mut app = app(&server, &ws_addr, PathBuf::from("./skills"));
    let code = timeout(
        TIMEOUT,
        app.execute(
            Commands::Run {
                name: "look-around".to_string(),
            },
            pending(),
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(code, EXIT_OK);
    let expected = format!(
        "{}\n{}",
        serde_json::to_string_pretty(&json!({ "result": true })).unwrap(),
        "[SkillData] hello\n\
         [SkillData] left\n\
         [SkillSystemStateChange] Running\n\
         [SkillSystemStateChange] Stopped\n"
    );
    assert_eq!(output(&app), expected);

    let (subscribes, unsubscribes) = timeout(TIMEOUT, frames_rx).await.unwrap().unwrap();
    assert_eq!(subscribes[0]["Type"], "SkillData");
    assert_eq!(subscribes[1]["Type"], "SkillSystemStateChange");
    assert_eq!(
        unsubscribes,
        vec![
            json!({ "Operation": "unsubscribe", "EventName": "SkillData" }),
            json!({ "Operation": "unsubscribe", "EventName": "SkillSystemStateChange" }),
        ]
    );
}

#[tokio::test]
async fn test_run_unknown_skill_never_starts() {
    let server = MockServer::start().await;
    mock_skills(&server, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/api/skills/start"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut app = app(&server, "127.0.0.1:9", PathBuf::from("./skills"));
    let code = app
        .execute(
            Commands::Run {
                name: "nope".to_string(),
            },
            pending(),
        )
        .await
        .unwrap();

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(output(&app), "Unknown skill \"nope\"\n");
}

#[tokio::test]
async fn test_run_reports_stream_closed_before_stop() {
    let server = MockServer::start().await;
    mock_skills(&server, json!([{ "name": "look-around", "uniqueId": "abc" }])).await;
    mock_start(&server, "abc").await;

    let ws_addr = spawn_robot(|mut ws| async move {
        let _ = read_control_frames(&mut ws, 2).await;
        ws.send(event("SkillData", json!("x"))).await.unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let mut app = app(&server, &ws_addr, PathBuf::from("./skills"));
    let code = timeout(
        TIMEOUT,
        app.execute(
            Commands::Run {
                name: "look-around".to_string(),
            },
            pending(),
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(code, EXIT_STREAM_CLOSED);
    assert!(output(&app).ends_with("[SkillData] x\n"));
}

#[tokio::test]
async fn test_run_interrupted_still_unsubscribes() {
    let server = MockServer::start().await;
    mock_skills(&server, json!([{ "name": "look-around", "uniqueId": "abc" }])).await;
    mock_start(&server, "abc").await;

    let (frames_tx, frames_rx) = oneshot::channel();
    let ws_addr = spawn_robot(move |mut ws| async move {
        let _ = read_control_frames(&mut ws, 2).await;
        let unsubscribes = read_control_frames(&mut ws, 2).await;
        let _ = frames_tx.send(unsubscribes);
    })
    .await;

    let mut app = app(&server, &ws_addr, PathBuf::from("./skills"));
    let code = timeout(
        TIMEOUT,
        app.execute(
            Commands::Run {
                name: "look-around".to_string(),
            },
            tokio::time::sleep(Duration::from_millis(200)),
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(code, EXIT_INTERRUPTED);
    let unsubscribes = timeout(TIMEOUT, frames_rx).await.unwrap().unwrap();
    assert_eq!(unsubscribes.len(), 2);
    assert!(
        unsubscribes
            .iter()
            .all(|frame| frame["Operation"] == "unsubscribe")
    );
}

#[tokio::test]
async fn test_stream_prints_envelopes_until_close() {
    let server = MockServer::start().await;
    let ws_addr = spawn_robot(|mut ws| async move {
        let frames = read_control_frames(&mut ws, 1).await;
        assert_eq!(frames[0]["EventName"], "BumpSensor");
        ws.send(event(
            "BumpSensor",
            json!({
                "message": "pressed",
                "data": { "sensorName": "Bump_FrontLeft" },
                "created": "2024-01-01T00:00:00Z",
            }),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let mut app = app(&server, &ws_addr, PathBuf::from("./skills"));
    let code = timeout(
        TIMEOUT,
        app.execute(
            Commands::Stream {
                events: vec![EventType::BumpSensor],
            },
            pending(),
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(code, EXIT_OK);
    let printed: Value = serde_json::from_str(output(&app).trim()).unwrap();
    assert_eq!(printed["eventName"], "BumpSensor");
    assert_eq!(printed["message"]["data"]["sensorName"], "Bump_FrontLeft");
    assert_eq!(printed["message"]["created"], "2024-01-01T00:00:00Z");
}

#[tokio::test]
async fn test_stream_keeps_printing_sensor_data_payloads() {
    let server = MockServer::start().await;
    let bump = |contacted: bool| {
        json!({
            "isContacted": contacted,
            "sensorName": "Bump_FrontLeft",
            "created": "2024-01-01T00:00:00Z",
        })
    };
    let ws_addr = spawn_robot(move |mut ws| async move {
        let _ = read_control_frames(&mut ws, 1).await;
        ws.send(event(
            "BumpSensor",
            json!("Registration Status: API event registered"),
        ))
        .await
        .unwrap();
        ws.send(event("BumpSensor", bump(true))).await.unwrap();
        ws.send(event("BumpSensor", bump(false))).await.unwrap();
        ws.close(None).await.unwrap();
    })
    .await;

    let mut app = app(&server, &ws_addr, PathBuf::from("./skills"));
    let code = timeout(
        TIMEOUT,
        app.execute(
            Commands::Stream {
                events: vec![EventType::BumpSensor],
            },
            pending(),
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(code, EXIT_OK);
    let printed: Vec<Value> = output(&app)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        printed,
        vec![
            json!({ "eventName": "BumpSensor", "message": "Registration Status: API event registered" }),
            json!({ "eventName": "BumpSensor", "message": bump(true) }),
            json!({ "eventName": "BumpSensor", "message": bump(false) }),
        ]
    );
}

#[tokio::test]
async fn test_remove_and_cancel_resolve_names() {
    let server = MockServer::start().await;
    mock_skills(&server, json!([{ "name": "look-around", "uniqueId": "abc" }])).await;
    Mock::given(method("POST"))
        .and(path("/api/skills/cancel"))
        .and(body_json(json!({ "Skill": "abc" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    let mut app = app(&server, "127.0.0.1:9", PathBuf::from("./skills"));
    let code = app
        .execute(
            Commands::Cancel {
                name: "look-around".to_string(),
            },
            pending(),
        )
        .await
        .unwrap();
    assert_eq!(code, EXIT_OK);

    let code = app
        .execute(
            Commands::Remove {
                name: "drive-around".to_string(),
            },
            pending(),
        )
        .await
        .unwrap();
    assert_eq!(code, EXIT_FAILURE);
    assert!(output(&app).ends_with("Unknown skill \"drive-around\"\n"));
}

#[tokio::test]
async fn test_led_sends_parsed_color_and_ignores_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/led"))
        .and(body_json(json!({ "red": 255, "green": 128, "blue": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    let mut app = app(&server, "127.0.0.1:9", PathBuf::from("./skills"));
    for color in ["orange", "chartreuse"] {
        let code = app
            .execute(
                Commands::Led {
                    color: color.to_string(),
                },
                pending(),
            )
            .await
            .unwrap();
        assert_eq!(code, EXIT_OK);
    }
}

#[tokio::test]
async fn test_info_filters_keys_by_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/device"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "batteryLevel": 80, "batteryCharging": false, "ipAddress": "10.0.0.5" }
        })))
        .mount(&server)
        .await;

    let mut app = app(&server, "127.0.0.1:9", PathBuf::from("./skills"));
    app.execute(
        Commands::Info {
            key: Some("battery".to_string()),
        },
        pending(),
    )
    .await
    .unwrap();

    let printed: Value = serde_json::from_str(&output(&app)).unwrap();
    assert_eq!(
        printed,
        json!({ "batteryLevel": 80, "batteryCharging": false })
    );
}

#[tokio::test]
async fn test_skills_lists_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/skills/running"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "name": "look-around", "uniqueId": "abc" },
                { "name": "drive-around", "uniqueId": "def" }
            ]
        })))
        .mount(&server)
        .await;

    let mut app = app(&server, "127.0.0.1:9", PathBuf::from("./skills"));
    app.execute(
        Commands::Skills {
            verbose: false,
            running: true,
        },
        pending(),
    )
    .await
    .unwrap();

    assert_eq!(output(&app), "look-around\ndrive-around\n");
}

#[tokio::test]
async fn test_deploy_uploads_bundle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("look-around.js"), "misty.Debug('hi');").unwrap();
    std::fs::write(dir.path().join("look-around.json"), "{}").unwrap();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/skills"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "ok" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut app = app(&server, "127.0.0.1:9", dir.path().to_path_buf());
    let code = app
        .execute(
            Commands::Deploy {
                name: "look-around".to_string(),
            },
            pending(),
        )
        .await
        .unwrap();

    assert_eq!(code, EXIT_OK);
    assert!(output(&app).contains("\"ok\""));

    let err = app
        .execute(
            Commands::Deploy {
                name: "missing".to_string(),
            },
            pending(),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing"));
}
