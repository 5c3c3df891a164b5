use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use reqwest::cookie::Jar;
use tokio::task::spawn_blocking;

use crate::analyze::{aggregate, AggregateReport, NO_RECORDS};
use crate::config::Config;
use crate::error::DecodeError;
use crate::model::Scholarship;
use crate::parse::decode;
use crate::request::{build_client, send};
use crate::session::{Session, Step};
use crate::store::{self, CsvSink};
use crate::{error_time, info_time, Result};

/// How a scrape run ended.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The RPC reply was decoded. `rejected` holds the objects that failed to
    /// decode; none of them reached the sink.
    Completed {
        written: usize,
        rejected: Vec<DecodeError>,
    },
    /// Login, transport or RPC failure. Nothing was written.
    Failed { reason: String },
}

/// Full program flow: scrape into `bolsas_pub_<year>.csv`, read it back and
/// print the summary.
pub async fn process_site(config: Config) -> Result<Option<AggregateReport>> {
    let start_time = Local::now();
    let output_path = config.output_path();

    let mut sink = CsvSink::create(&output_path)?;
    let outcome = scrape(Session::new(config), &mut sink).await?;
    sink.finish()?;
    info_time!(start_time, "Scrape finished: {:?}", outcome);

    let report = summarize(&output_path)?;
    match &report {
        Some(report) => println!("{report}"),
        None => println!("{NO_RECORDS}"),
    }
    Ok(report)
}

/// Drives `session` to a terminal phase, writing decoded records to `sink`.
///
/// Transport and protocol failures end the run as [`RunOutcome::Failed`];
/// only sink and runtime errors are returned as `Err`.
pub async fn scrape<W: Write>(mut session: Session, sink: &mut CsvSink<W>) -> Result<RunOutcome> {
    let jar = Arc::new(Jar::default());
    let client = build_client(jar.clone())?;

    let mut next = session.start()?;
    loop {
        // One request in flight at a time; the next one depends on this reply.
        let step = match send(&client, &jar, next).await {
            Ok(page) => session.on_page(&page),
            Err(e) => session.on_error(&e),
        };

        match step {
            Step::Send(request) => next = request,
            Step::Decode(body) => {
                let (records, rejected) = spawn_blocking(move || decode_all(&body)).await?;
                for record in &records {
                    sink.write(record)?;
                }
                info_time!("Wrote {} records, rejected {}", records.len(), rejected.len());
                return Ok(RunOutcome::Completed {
                    written: records.len(),
                    rejected,
                });
            }
            Step::Stop => {
                let reason = session.failure().unwrap_or("stopped").to_owned();
                return Ok(RunOutcome::Failed { reason });
            }
        }
    }
}

/// Splits a reply into good records and per-object decode failures.
fn decode_all(body: &str) -> (Vec<Scholarship>, Vec<DecodeError>) {
    let mut records = Vec::new();
    let mut rejected = Vec::new();
    for (i, result) in decode(body).enumerate() {
        match result {
            Ok(record) => records.push(record),
            Err(e) => {
                error_time!("Object #{} rejected: {}", i, e);
                rejected.push(e);
            }
        }
    }
    (records, rejected)
}

/// Re-reads the persisted records and aggregates them.
pub fn summarize(path: &Path) -> Result<Option<AggregateReport>> {
    let records = store::load(path)?;
    info_time!("Read {} records from {}", records.len(), path.display());
    Ok(aggregate(&records))
}
