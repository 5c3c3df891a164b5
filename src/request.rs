use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use reqwest::cookie::Jar;
use reqwest::header::{CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::{Client, Response};

use crate::session::{Page, Request};
use crate::{info_time, Result, POOL_IDLE_TIMEOUT_SECS, REQUEST_TIMEOUT_SECS, USER_AGENT};

/// Client shared by every step of a run. The portal is slow, so every request
/// gets the same generous timeout and idle connections are kept around
/// between steps.
pub(crate) fn build_client(jar: Arc<Jar>) -> Result<Client> {
    let client = Client::builder()
        .cookie_provider(jar)
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

/// Performs one protocol request. Non-2xx statuses are returned as errors.
pub(crate) async fn send(client: &Client, jar: &Jar, request: Request) -> Result<Page> {
    match request {
        Request::Get { url } => {
            info_time!("GET {url}");
            read_page(client.get(url).send().await?).await
        }
        Request::Login { url, form, delay } => {
            tokio::time::sleep(delay).await;
            info_time!("POST credentials to {url}");
            read_page(client.post(url).form(&form).send().await?).await
        }
        Request::Rpc { url, body, origin, referer, cookie } => {
            jar.add_cookie_str(&cookie, &referer);
            info_time!("POST RPC call to {url}");
            let start_time = Local::now();

            // Client uses Arc so we can clone cheaply; the clone shares the jar and pool.
            let rpc_client = client.clone();
            let page = tokio::spawn(async move {
                let response = rpc_client
                    .post(url)
                    .header(CONTENT_TYPE, "text/plain")
                    .header(ORIGIN, origin)
                    .header(REFERER, referer.as_str())
                    .body(body)
                    .send()
                    .await?;
                read_page(response).await
            })
            .await??;

            info_time!(start_time, "RPC reply received: {} bytes", page.body.len());
            Ok(page)
        }
    }
}

async fn read_page(response: Response) -> Result<Page> {
    let response = response.error_for_status()?;
    let url = response.url().clone();
    let body = response.text().await?;
    Ok(Page { url, body })
}
