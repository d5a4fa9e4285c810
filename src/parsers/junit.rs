//! JUnit / TestNG XML parser.
//!
//! Handles `<testsuites>`, `<testsuite>`, and `<testng-results>` roots and
//! arbitrarily nested suites; every `<testcase>` found anywhere in the
//! document is turned into a [`TestCaseResult`].

use crate::model::{TestCaseResult, TestStatus};
use crate::parsers::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Parse a JUnit-style XML file from disk.
pub fn parse_junit_xml(
    path: &Path,
    default_suite: Option<&str>,
) -> Result<Vec<TestCaseResult>, ParseError> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: display.clone(),
        source,
    })?;
    parse_junit_str(&content, default_suite).map_err(|source| ParseError::Xml {
        path: display,
        source,
    })
}

/// Parse JUnit-style XML from an in-memory string.
pub fn parse_junit_str(
    xml: &str,
    default_suite: Option<&str>,
) -> Result<Vec<TestCaseResult>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut results = Vec::new();
    // Suite names nest; the innermost named suite wins.
    let mut suite_stack: Vec<Option<String>> = Vec::new();
    let mut current: Option<TestCaseResult> = None;
    // Set while inside a <failure> or <error> node so text/CDATA is
    // captured as the stack excerpt.
    let mut capturing_details = false;
    let mut details_buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"testsuite" | b"testsuites" | b"testng-results" => {
                    suite_stack.push(attr(&e, "name")?);
                }
                b"testcase" => {
                    current = Some(begin_testcase(&e, &suite_stack, default_suite)?);
                }
                b"failure" | b"error" | b"skipped" => {
                    if let Some(case) = current.as_mut() {
                        let first_outcome = case.status == TestStatus::Pass;
                        apply_outcome_node(case, &e)?;
                        if first_outcome && e.name().as_ref() != b"skipped" {
                            capturing_details = true;
                            details_buf.clear();
                        }
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"testcase" => {
                    results.push(begin_testcase(&e, &suite_stack, default_suite)?);
                }
                b"failure" | b"error" | b"skipped" => {
                    if let Some(case) = current.as_mut() {
                        apply_outcome_node(case, &e)?;
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                if capturing_details {
                    details_buf.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if capturing_details {
                    details_buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"testcase" => {
                    if let Some(case) = current.take() {
                        results.push(case);
                    }
                }
                b"failure" | b"error" => {
                    if capturing_details {
                        capturing_details = false;
                        let trimmed = details_buf.trim();
                        if !trimmed.is_empty() {
                            if let Some(case) = current.as_mut() {
                                case.error_details = Some(trimmed.to_string());
                            }
                        }
                    }
                }
                b"testsuite" | b"testsuites" | b"testng-results" => {
                    suite_stack.pop();
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(results)
}

fn begin_testcase(
    e: &BytesStart<'_>,
    suite_stack: &[Option<String>],
    default_suite: Option<&str>,
) -> Result<TestCaseResult, quick_xml::Error> {
    let suite = suite_stack
        .iter()
        .rev()
        .find_map(|s| s.clone())
        .or_else(|| default_suite.map(str::to_string));

    let classname = match attr(e, "classname")? {
        Some(c) => c,
        // TestNG uses "class"
        None => match attr(e, "class")? {
            Some(c) => c,
            None => suite.clone().unwrap_or_else(|| "unknown".to_string()),
        },
    };
    let name = attr(e, "name")?.unwrap_or_else(|| "unknown".to_string());

    let duration_ms = attr(e, "time")?
        .and_then(|t| t.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as i64);

    let mut case = TestCaseResult::passed(format!("{classname}#{name}"), suite);
    case.duration_ms = duration_ms;
    Ok(case)
}

/// Set status and error attributes from a failure/error/skipped node. The
/// first outcome node wins when a testcase carries more than one.
fn apply_outcome_node(
    case: &mut TestCaseResult,
    e: &BytesStart<'_>,
) -> Result<(), quick_xml::Error> {
    if case.status != TestStatus::Pass {
        return Ok(());
    }
    match e.name().as_ref() {
        b"failure" => {
            case.status = TestStatus::Fail;
            case.error_type = attr(e, "type")?;
            case.error_message = attr(e, "message")?;
        }
        b"error" => {
            case.status = TestStatus::Error;
            case.error_type = attr(e, "type")?;
            case.error_message = attr(e, "message")?;
        }
        b"skipped" => {
            case.status = TestStatus::Skipped;
        }
        _ => {}
    }
    Ok(())
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, quick_xml::Error> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}
