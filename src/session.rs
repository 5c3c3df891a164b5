//! The login -> listing -> RPC conversation a browser has with the portal,
//! as an explicit state machine.
//!
//! [`Session`] never performs I/O. It hands out the next [`Request`] to send and
//! reacts to each received [`Page`] (or transport error) through a single
//! dispatch function, moving strictly forward through [`Phase`].

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;

use crate::config::Config;
use crate::parse::has_login_form;
use crate::token::ScriptSession;
use crate::{error_time, info_time, Error, Result, ERROR_MARKER, EXCERPT_LEN, SUBMIT_FIELD};

/// Protocol phases, in the only order they may be visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Unauthenticated,
    LoginSubmitted,
    Authenticated,
    TokenPrepared,
    RequestInFlight,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

/// An HTTP request the driver has to perform on the session's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get {
        url: Url,
    },
    /// Credentials form, posted after `delay`.
    Login {
        url: Url,
        form: Vec<(&'static str, String)>,
        delay: Duration,
    },
    /// Raw `text/plain` RPC call. `cookie` has to be in the jar before sending.
    Rpc {
        url: Url,
        body: String,
        origin: String,
        referer: Url,
        cookie: String,
    },
}

/// A received response, after redirects.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: Url,
    pub body: String,
}

/// What the driver should do after a dispatch.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Send(Request),
    /// The RPC reply, ready for the record decoder.
    Decode(String),
    /// Nothing more to do; the phase tells how the run ended.
    Stop,
}

/// Owned, per-run protocol state.
#[derive(Debug)]
pub struct SessionState {
    pub phase: Phase,
    pub script_session: Option<ScriptSession>,
    pub request_counter: u32,
}

pub struct Session {
    config: Config,
    state: SessionState,
    failure: Option<String>,
    rng: StdRng,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Same as [`Session::new`] with a caller-supplied random source.
    pub fn with_rng(config: Config, rng: StdRng) -> Self {
        Self {
            config,
            state: SessionState {
                phase: Phase::Unauthenticated,
                script_session: None,
                request_counter: 0,
            },
            failure: None,
            rng,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Why the session ended in `Failed`, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    /// The opening request: fetch the login page.
    pub fn start(&self) -> Result<Request> {
        Ok(Request::Get {
            url: self.config.login_url()?,
        })
    }

    /// Single dispatch point for every received response.
    pub fn on_page(&mut self, page: &Page) -> Step {
        match self.handle_page(page) {
            Ok(step) => step,
            Err(e) => self.fail(format!("Couldn't handle response from {}: {e}", page.url)),
        }
    }

    /// Error hook for transport failures (network, timeout, non-2xx status).
    /// Logged, never retried.
    pub fn on_error(&mut self, err: &Error) -> Step {
        self.fail(format!("Transport error during {:?}: {err}", self.state.phase))
    }

    fn handle_page(&mut self, page: &Page) -> Result<Step> {
        match self.state.phase {
            Phase::Unauthenticated => {
                if !has_login_form(&page.body)? {
                    return Ok(self.fail(format!("No login form found at {}", page.url)));
                }
                self.advance(Phase::LoginSubmitted);
                Ok(Step::Send(Request::Login {
                    url: self.config.auth_url()?,
                    form: vec![
                        ("codpes", self.config.username.clone()),
                        ("senusu", self.config.password.clone()),
                        (SUBMIT_FIELD.0, SUBMIT_FIELD.1.to_owned()),
                    ],
                    delay: self.config.login_delay(),
                }))
            }
            Phase::LoginSubmitted => {
                let auth_url = self.config.auth_url()?;
                if page.url.path() != auth_url.path() {
                    return Ok(self.fail(format!("Login rejected, landed on {}", page.url)));
                }
                self.advance(Phase::Authenticated);
                Ok(Step::Send(Request::Get {
                    url: self.config.listing_url()?,
                }))
            }
            Phase::Authenticated => {
                let listing_url = self.config.listing_url()?;
                if page.url.path() != listing_url.path() {
                    return Ok(self.fail(format!("Expected the listing page, got {}", page.url)));
                }
                let script_session = ScriptSession::fabricate(&mut self.rng);
                self.state.script_session = Some(script_session.clone());
                self.advance(Phase::TokenPrepared);
                self.submit_rpc(listing_url, &script_session).map(Step::Send)
            }
            Phase::RequestInFlight => {
                if page.body.contains(ERROR_MARKER) {
                    let excerpt: String = page.body.chars().take(EXCERPT_LEN).collect();
                    return Ok(self.fail(format!("RPC call failed: {excerpt}")));
                }
                self.advance(Phase::Completed);
                Ok(Step::Decode(page.body.clone()))
            }
            // No request is outstanding in these phases.
            Phase::TokenPrepared | Phase::Completed | Phase::Failed => Ok(Step::Stop),
        }
    }

    fn submit_rpc(&mut self, listing_url: Url, script_session: &ScriptSession) -> Result<Request> {
        let domain = listing_url.host_str().unwrap_or_default().to_owned();
        let request = Request::Rpc {
            url: self.config.rpc_url()?,
            body: rpc_payload(
                &self.config,
                listing_url.path(),
                script_session,
                self.state.request_counter,
            ),
            origin: self.config.origin()?,
            referer: listing_url,
            cookie: script_session.cookie(&self.config.app_path, &domain),
        };
        self.state.request_counter += 1;
        self.advance(Phase::RequestInFlight);
        Ok(request)
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.state.phase, "{:?} -> {:?}", self.state.phase, next);
        info_time!("Session: {:?} -> {:?}", self.state.phase, next);
        self.state.phase = next;
    }

    fn fail(&mut self, reason: String) -> Step {
        error_time!("{}", reason);
        if !self.state.phase.is_terminal() {
            info_time!("Session: {:?} -> {:?}", self.state.phase, Phase::Failed);
            self.state.phase = Phase::Failed;
            self.failure = Some(reason);
        }
        Step::Stop
    }
}

/// Plain-text DWR call: one `key=value` per line, ending with a blank line.
pub fn rpc_payload(
    config: &Config,
    page_path: &str,
    session: &ScriptSession,
    batch_id: u32,
) -> String {
    let lines = [
        "callCount=1".to_owned(),
        format!("c0-scriptName={}", config.rpc_script),
        format!("c0-methodName={}", config.rpc_method),
        "c0-id=0".to_owned(),
        format!("c0-param0=string:{}", config.year),
        "c0-param1=string:".to_owned(),
        "c0-param2=string:".to_owned(),
        "c0-param3=string:".to_owned(),
        "c0-param4=boolean:false".to_owned(),
        format!("batchId={batch_id}"),
        "instanceId=0".to_owned(),
        format!("page={}", urlencoding::encode(page_path)),
        format!("scriptSessionId={}", session.script_session_id()),
    ];
    let mut payload = lines.join("\n");
    payload.push_str("\n\n");
    payload
}
