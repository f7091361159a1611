use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sitewatch_core::{ChangeRecord, MonitorTarget, TargetKey};
use sitewatch_fetch::validate_selector;
use sitewatch_store::NewTarget;

use crate::cli::OutputFormat;
use crate::context::AppContext;

pub(crate) fn handle_add(
    ctx: &AppContext,
    url: String,
    selector: String,
    frequency_minutes: u32,
    rendered: bool,
    evidence: bool,
) -> Result<()> {
    validate_selector(&selector)?;

    let mut new_target = NewTarget::new(url, selector, frequency_minutes);
    new_target.use_rendered_fetch = rendered;
    new_target.capture_evidence = evidence;

    let store = ctx.store();
    let target = store.add(new_target)?;
    println!(
        "Added {} ({}) every {} min [{}] to {}",
        target.url,
        target.selector,
        target.frequency_minutes,
        fetch_mode(&target),
        store.path().display()
    );
    Ok(())
}

#[derive(Serialize)]
struct ListEntry<'a> {
    url: &'a str,
    selector: &'a str,
    frequency_minutes: u32,
    fetch: &'static str,
    capture_evidence: bool,
    observations: usize,
    changes: usize,
    last_observed: Option<DateTime<Utc>>,
}

impl<'a> From<&'a MonitorTarget> for ListEntry<'a> {
    fn from(target: &'a MonitorTarget) -> Self {
        Self {
            url: &target.url,
            selector: &target.selector,
            frequency_minutes: target.frequency_minutes,
            fetch: fetch_mode(target),
            capture_evidence: target.capture_evidence,
            observations: target.history.len(),
            changes: target.history.iter().filter(|r| r.is_change()).count(),
            last_observed: target.last_record().map(|r| r.timestamp),
        }
    }
}

pub(crate) fn handle_list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let targets = ctx.store().load()?;
    match format {
        OutputFormat::Json => {
            let entries: Vec<ListEntry<'_>> = targets.iter().map(ListEntry::from).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if targets.is_empty() {
                eprintln!("No targets. Add one with `sitewatch add <url> <selector> <minutes>`.");
            }
            for target in &targets {
                println!("{}", format_list_line(target));
            }
        }
    }
    Ok(())
}

pub(crate) fn handle_history(
    ctx: &AppContext,
    url: String,
    selector: String,
    format: OutputFormat,
) -> Result<()> {
    let key = TargetKey::new(url, selector);
    let Some(target) = ctx
        .store()
        .find(&key)
        .with_context(|| format!("Failed to look up {key}"))?
    else {
        bail!(
            "No target {} with selector '{}'. See `sitewatch list`.",
            key.url,
            key.selector
        );
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&target.history)?),
        OutputFormat::Text => print!("{}", format_history(&target.history)),
    }
    Ok(())
}

fn fetch_mode(target: &MonitorTarget) -> &'static str {
    if target.use_rendered_fetch {
        "rendered"
    } else {
        "static"
    }
}

pub(crate) fn format_list_line(target: &MonitorTarget) -> String {
    let status = match target.last_record() {
        None => "never checked".to_string(),
        Some(record) => format!(
            "{} observation(s), last {}",
            target.history.len(),
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    };
    let evidence = if target.capture_evidence {
        ", evidence"
    } else {
        ""
    };
    format!(
        "{}  {}  every {} min  [{}{}]  {}",
        target.url,
        target.selector,
        target.frequency_minutes,
        fetch_mode(target),
        evidence,
        status
    )
}

pub(crate) fn format_history(history: &[ChangeRecord]) -> String {
    if history.is_empty() {
        return "No observations recorded yet.\n".to_string();
    }

    let mut out = String::new();
    for record in history {
        let kind = if record.is_change() {
            "CHANGE"
        } else {
            "BASELINE"
        };
        let short_fp: String = record.fingerprint.chars().take(12).collect();
        out.push_str(&format!(
            "{}  {kind}  {short_fp}\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        match &record.diff {
            Some(diff) => out.push_str(&format!("  diff: {diff}\n")),
            None => out.push_str(&format!("  text: {}\n", record.text)),
        }
        if let Some(before) = &record.evidence_before {
            out.push_str(&format!("  before: {before}\n"));
        }
        if let Some(after) = &record.evidence_after {
            out.push_str(&format!("  after: {after}\n"));
        }
    }
    out
}
