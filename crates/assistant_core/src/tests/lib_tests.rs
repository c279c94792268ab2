use super::*;
use axum::{http::StatusCode, routing::get, routing::post, Json, Router};
use shared::{
    domain::{AnswerMode, MessageKind, Role},
    protocol::{BackendErrorBody, HealthResponse, QueryResponse},
};
use tokio::net::TcpListener;

async fn handle_query(Json(request): Json<QueryRequest>) -> Json<QueryResponse> {
    Json(QueryResponse {
        answer: format!("{} answer to: {}", request.mode, request.question),
        source_documents: vec!["chapter 1, page 4".into()],
    })
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Smart Research Assistant Backend is Running".into(),
    })
}

async fn handle_broken_query() -> (StatusCode, Json<BackendErrorBody>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(BackendErrorBody {
            detail: "PINECONE_API_KEY not found in env.".into(),
        }),
    )
}

async fn handle_blank_query() -> Json<QueryResponse> {
    Json(QueryResponse {
        answer: "   ".into(),
        source_documents: Vec::new(),
    })
}

async fn spawn_backend(router: Router) -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

fn healthy_router() -> Router {
    Router::new()
        .route("/", get(handle_health))
        .route("/query", post(handle_query))
}

#[tokio::test]
async fn backend_query_sends_question_and_wire_mode() -> anyhow::Result<()> {
    let base_url = spawn_backend(healthy_router()).await?;
    let client = BackendClient::new(base_url);

    let response = client
        .query(&QueryRequest {
            question: "Explain photosynthesis".into(),
            mode: AnswerMode::FiveMark,
        })
        .await?;

    assert_eq!(response.answer, "5-mark answer to: Explain photosynthesis");
    assert_eq!(response.source_documents.len(), 1);
    Ok(())
}

#[tokio::test]
async fn backend_health_returns_banner() -> anyhow::Result<()> {
    let base_url = spawn_backend(healthy_router()).await?;
    let health = BackendClient::new(base_url).health().await?;
    assert!(health.message.contains("Running"));
    Ok(())
}

#[tokio::test]
async fn backend_error_status_surfaces_detail() -> anyhow::Result<()> {
    let base_url = spawn_backend(Router::new().route("/query", post(handle_broken_query))).await?;
    let err = BackendClient::new(base_url)
        .query(&QueryRequest {
            question: "Explain entropy".into(),
            mode: AnswerMode::Concise,
        })
        .await
        .expect_err("backend failure");

    match err {
        BackendError::Status { status, detail } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(detail, "PINECONE_API_KEY not found in env.");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn blank_backend_answer_is_an_error() -> anyhow::Result<()> {
    let base_url = spawn_backend(Router::new().route("/query", post(handle_blank_query))).await?;
    let err = BackendClient::new(base_url)
        .query(&QueryRequest {
            question: "Explain entropy".into(),
            mode: AnswerMode::Concise,
        })
        .await
        .expect_err("blank answer");
    assert!(matches!(err, BackendError::EmptyAnswer));
    Ok(())
}

/// Accepts connections and holds them open without ever writing a byte.
async fn spawn_silent_backend() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn silent_backend_health_times_out() -> anyhow::Result<()> {
    let base_url = spawn_silent_backend().await?;
    let client = BackendClient::new(base_url).with_timeout(Duration::from_millis(200));

    let outcome = tokio::time::timeout(Duration::from_secs(5), client.health()).await;
    let err = outcome
        .expect("client gave up on its own")
        .expect_err("silent backend");
    assert!(matches!(err, BackendError::Timeout(limit) if limit == Duration::from_millis(200)));
    assert!(err.to_string().contains("did not respond within 200ms"));
    Ok(())
}

#[tokio::test]
async fn silent_backend_query_times_out() -> anyhow::Result<()> {
    let base_url = spawn_silent_backend().await?;
    let err = BackendClient::new(base_url)
        .with_timeout(Duration::from_millis(200))
        .query(&QueryRequest {
            question: "Explain entropy".into(),
            mode: AnswerMode::TenMark,
        })
        .await
        .expect_err("silent backend");
    assert!(matches!(err, BackendError::Timeout(_)));
    Ok(())
}

#[tokio::test]
async fn conversation_over_http_backend_commits_backend_answer() -> anyhow::Result<()> {
    let base_url = spawn_backend(healthy_router()).await?;
    let settings = Settings {
        backend_url: Some(base_url),
        ..Settings::default()
    };
    let controller = ConversationController::new(
        response_producer_from_settings(&settings)?,
        settings.response_timeout(),
    );
    let mut events = controller.subscribe_events();

    controller.set_mode(AnswerMode::TenMark).await;
    controller.submit("Compare mitosis and meiosis").await;
    loop {
        if let ConversationEvent::PendingChanged(false) = events.recv().await? {
            break;
        }
    }

    let answer = controller.messages().await.pop().expect("answer");
    assert_eq!(answer.role, Role::Assistant);
    assert_eq!(answer.kind, MessageKind::Text);
    assert_eq!(answer.text, "10-mark answer to: Compare mitosis and meiosis");
    Ok(())
}

#[tokio::test]
async fn conversation_renders_backend_failure_as_error_message() -> anyhow::Result<()> {
    let base_url = spawn_backend(Router::new().route("/query", post(handle_broken_query))).await?;
    let controller =
        ConversationController::new(Arc::new(BackendClient::new(base_url)), Duration::from_secs(5));
    let mut events = controller.subscribe_events();

    controller.submit("Explain entropy").await;
    loop {
        if let ConversationEvent::PendingChanged(false) = events.recv().await? {
            break;
        }
    }

    let answer = controller.messages().await.pop().expect("answer");
    assert_eq!(answer.kind, MessageKind::Error);
    assert!(answer.text.contains("PINECONE_API_KEY not found"), "{}", answer.text);
    assert!(!controller.is_pending().await);
    Ok(())
}

#[tokio::test]
async fn invalid_backend_url_is_reported() {
    let settings = Settings {
        backend_url: Some("ftp://notes.example.com".into()),
        ..Settings::default()
    };
    assert!(response_producer_from_settings(&settings).is_err());
}

#[tokio::test(start_paused = true)]
async fn canned_producer_waits_then_answers_by_mode() -> anyhow::Result<()> {
    let settings = Settings::default();
    let producer = response_producer_from_settings(&settings)?;
    let started = tokio::time::Instant::now();

    let answer = producer
        .produce(&QueryRequest {
            question: "Explain photosynthesis".into(),
            mode: AnswerMode::FiveMark,
        })
        .await?;

    assert_eq!(answer, templates::FIVE_MARK_ANSWER);
    assert!(started.elapsed() >= settings.response_latency());
    Ok(())
}

#[tokio::test]
async fn missing_producer_always_fails() {
    let err = MissingResponseProducer
        .produce(&QueryRequest {
            question: "anything".into(),
            mode: AnswerMode::Concise,
        })
        .await
        .expect_err("missing backend");
    assert!(err.to_string().contains("unavailable"));
}

#[tokio::test(start_paused = true)]
async fn simulated_processor_reports_file_ready() -> anyhow::Result<()> {
    let processor = ingestion_processor_from_settings(&Settings::default());
    let report = processor
        .process(&FileDescriptor {
            id: shared::domain::FileId::random(),
            name: "notes.pdf".into(),
            size_bytes: 2_000_000,
            size_display: format_size(2_000_000),
            media_type: config::DEFAULT_ACCEPTED_MEDIA_TYPE.into(),
        })
        .await?;
    assert_eq!(report.detail.as_deref(), Some("notes.pdf ready"));
    Ok(())
}
