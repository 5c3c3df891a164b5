//! Runs whole scrape sessions against a local stub of the portal.

use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, Method, Request, StatusCode, Uri};
use axum::response::Html;
use axum::Router;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::TcpListener;
use tower::ServiceExt;

use usp_bolsas::config::Config;
use usp_bolsas::process::{scrape, RunOutcome};
use usp_bolsas::session::Session;
use usp_bolsas::store::{read_scholarships, CsvSink};
use usp_bolsas::token::ScriptSession;
use usp_bolsas::DecodeError;

const SEED: u64 = 3;

const LOGIN_PATH: &str = "/apolo/";
const AUTH_PATH: &str = "/apolo/autenticar";
const LISTING_PATH: &str = "/apolo/bolsaPublicacaoListar";
const RPC_PATH: &str =
    "/apolo/dwr/call/plaincall/BolsaPublicacaoControleDWR.listarBolsasPublicadas.dwr";

const LOGIN_HTML: &str = r#"<html><body><form action="autenticar" method="post">
<input type="text" name="codpes"><input type="password" name="senusu">
<input type="submit" name="Submit" value="Entrar"></form></body></html>"#;

const GOOD_REPLY: &str = r#"//#DWR-INSERT
//#DWR-REPLY
dwr.engine._remoteHandleCallback('0','0',[{anoProjeto:"2023",nomeUnidade:"Unit A",nomeVertente:"Pesquisa",qtdBolsas:10,tituloProjeto:"Primeiro"},{anoProjeto:"2023",nomeUnidade:"Unit B",nomeVertente:"Cultura",qtdBolsas:5,tituloProjeto:"Segundo"}]);
"#;

#[derive(Debug, Clone)]
struct Seen {
    method: String,
    path: String,
    /// One lowercased `name: value` line per header.
    head: String,
    body: String,
}

#[derive(Clone)]
struct Stub {
    listing_status: u16,
    rpc_reply: &'static str,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stub {
    fn new(rpc_reply: &'static str) -> Self {
        Self {
            listing_status: 200,
            rpc_reply,
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    fn route(&self, method: &Method, path: &str) -> (u16, &'static str) {
        match (method.as_str(), path) {
            ("GET", LOGIN_PATH) => (200, LOGIN_HTML),
            ("POST", AUTH_PATH) => (200, "<html>Bem-vindo</html>"),
            ("GET", LISTING_PATH) => (self.listing_status, "<html>Bolsas</html>"),
            ("POST", RPC_PATH) => (200, self.rpc_reply),
            _ => (404, "not found"),
        }
    }

    fn router(self) -> Router {
        Router::new().fallback(record).with_state(self)
    }
}

/// Records every request, then answers from [`Stub::route`].
async fn record(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Html<&'static str>) {
    let (status, reply) = stub.route(&method, uri.path());
    let head = headers
        .iter()
        .map(|(name, value)| format!("{}: {}\n", name, String::from_utf8_lossy(value.as_bytes())))
        .collect::<String>()
        .to_ascii_lowercase();
    stub.seen.lock().unwrap().push(Seen {
        method: method.to_string(),
        path: uri.path().to_owned(),
        head,
        body: String::from_utf8_lossy(&body).into_owned(),
    });
    (StatusCode::from_u16(status).unwrap(), Html(reply))
}

/// Serves the stub on an ephemeral port and returns its base URL.
async fn serve(stub: Stub) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = stub.router();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn config(base_url: &str) -> Config {
    Config::from_json(&format!(
        r#"{{ "username": "1234567", "password": "s3nh@", "year": 2023,
             "base_url": "{base_url}", "login_delay_ms": 0 }}"#
    ))
    .unwrap()
}

async fn run(stub: &Stub) -> (RunOutcome, Vec<u8>) {
    let base_url = serve(stub.clone()).await;
    let session = Session::with_rng(config(&base_url), StdRng::seed_from_u64(SEED));
    let mut sink = CsvSink::new(Vec::new()).unwrap();
    let outcome = scrape(session, &mut sink).await.unwrap();
    (outcome, sink.finish().unwrap())
}

#[tokio::test]
async fn full_session_writes_decoded_records() {
    let stub = Stub::new(GOOD_REPLY);
    let (outcome, bytes) = run(&stub).await;

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            written: 2,
            rejected: vec![]
        }
    );
    let records = read_scholarships(bytes.as_slice()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].unit, "Unit A");
    assert_eq!(records[1].grant_count, 5);

    let seen = stub.seen();
    let steps: Vec<(&str, &str)> = seen.iter().map(|s| (s.method.as_str(), s.path.as_str())).collect();
    assert_eq!(
        steps,
        vec![
            ("GET", LOGIN_PATH),
            ("POST", AUTH_PATH),
            ("GET", LISTING_PATH),
            ("POST", RPC_PATH)
        ]
    );

    let login = &seen[1];
    assert_eq!(login.body, "codpes=1234567&senusu=s3nh%40&Submit=Entrar");

    // The session draws nothing from its rng before fabricating the token.
    let script_session = ScriptSession::fabricate(&mut StdRng::seed_from_u64(SEED));
    let rpc = &seen[3];
    assert!(rpc.head.contains(&format!(
        "cookie: dwrsessionid={}\n",
        script_session.token().to_ascii_lowercase()
    )));
    assert!(rpc.body.contains(&format!(
        "scriptSessionId={}\n",
        script_session.script_session_id()
    )));
    assert!(rpc.head.contains("content-type: text/plain"));
    assert!(rpc.head.contains("origin: http://127.0.0.1:"));
    assert!(rpc.head.contains("referer: http://127.0.0.1:"));
    assert!(rpc.head.contains("/apolo/bolsapublicacaolistar"));
    assert!(rpc.body.starts_with("callCount=1\n"));
    assert!(rpc.body.contains("c0-param0=string:2023\n"));
    assert!(rpc.body.contains("page=%2Fapolo%2FbolsaPublicacaoListar\n"));
    assert!(rpc.body.ends_with("\n\n"));
}

#[tokio::test]
async fn exception_reply_writes_nothing() {
    let stub = Stub::new(
        "dwr.engine._remoteHandleException('0','0',{javaClassName:'java.lang.IllegalStateException',message:'Sessao invalida'});",
    );
    let (outcome, bytes) = run(&stub).await;

    match outcome {
        RunOutcome::Failed { reason } => assert!(reason.contains("Exception")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(read_scholarships(bytes.as_slice()).unwrap().is_empty());
}

#[tokio::test]
async fn object_without_grant_count_is_rejected_not_written() {
    let stub = Stub::new(
        r#"cb('0','0',[{anoProjeto:"2023",nomeUnidade:"Unit A",qtdBolsas:3},{anoProjeto:"2023",nomeUnidade:"Unit B",tituloProjeto:"Sem bolsas"}]);"#,
    );
    let (outcome, bytes) = run(&stub).await;

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            written: 1,
            rejected: vec![DecodeError::MissingGrantCount]
        }
    );
    let records = read_scholarships(bytes.as_slice()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].unit, "Unit A");
}

#[tokio::test]
async fn server_error_ends_the_run_without_retry() {
    let mut stub = Stub::new(GOOD_REPLY);
    stub.listing_status = 500;
    let (outcome, bytes) = run(&stub).await;

    assert!(matches!(outcome, RunOutcome::Failed { .. }));
    assert!(read_scholarships(bytes.as_slice()).unwrap().is_empty());
    // Login page, credentials, listing; no RPC and no second listing attempt.
    assert_eq!(stub.seen().len(), 3);
}

#[tokio::test]
async fn stub_answers_unknown_routes_with_404() {
    let stub = Stub::new(GOOD_REPLY);
    let response = stub
        .clone()
        .router()
        .oneshot(Request::builder().uri("/elsewhere").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(stub.seen()[0].path, "/elsewhere");
}
