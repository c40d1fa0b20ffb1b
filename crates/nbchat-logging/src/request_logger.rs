use colored::Colorize;
use serde::Serialize;

use crate::safe_truncate;

/// Longest body printed before truncation
const MAX_LOGGED_BODY_CHARS: usize = 5000;

/// Show only the first few characters of a credential
pub fn mask_key(api_key: &str) -> String {
    format!("{}***", api_key.chars().take(6).collect::<String>())
}

fn print_body(body: &str) {
    if body.chars().count() > MAX_LOGGED_BODY_CHARS {
        println!("{}", safe_truncate(body, MAX_LOGGED_BODY_CHARS));
        println!(
            "\n{}",
            format!("... (truncated, total {} bytes)", body.len()).bright_black()
        );
    } else {
        println!("{}", body);
    }
}

/// Log HTTP request details for debugging (console output)
pub fn log_request<T: Serialize>(
    method: &str,
    url: &str,
    body: Option<&T>,
    api_key: Option<&str>,
    verbose: bool,
) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_cyan());
    println!("{}", "🔍 HTTP REQUEST DEBUG".bright_cyan().bold());
    println!("{}", "═".repeat(80).bright_cyan());

    println!("{}: {} {}", "Request".bright_yellow(), method, url);
    if let Ok(parsed_url) = reqwest::Url::parse(url) {
        println!(
            "{}: {}",
            "Host".bright_yellow(),
            parsed_url.host_str().unwrap_or("unknown")
        );
        println!(
            "{}: {}",
            "Port".bright_yellow(),
            parsed_url
                .port_or_known_default()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }

    println!("\n{}", "Headers:".bright_yellow());
    println!("  Content-Type: application/json");
    if let Some(key) = api_key {
        println!("  Authorization: Bearer {}", mask_key(key));
    }

    if let Some(body) = body {
        println!("\n{}", "Request Body:".bright_yellow());
        match serde_json::to_string_pretty(body) {
            Ok(json) => print_body(&json),
            Err(e) => println!("{}", format!("Error serializing request: {}", e).red()),
        }
    }

    println!("{}", "═".repeat(80).bright_cyan());
    println!();
}

/// Log HTTP response details for debugging (console output)
pub fn log_response(status: reqwest::StatusCode, body: &str, verbose: bool) {
    if !verbose {
        return;
    }

    println!("\n{}", "═".repeat(80).bright_green());
    println!("{}", "📥 HTTP RESPONSE DEBUG".bright_green().bold());
    println!("{}", "═".repeat(80).bright_green());

    println!(
        "{}: {} {}",
        "Status".bright_yellow(),
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown")
    );

    println!("\n{}", "Response Body:".bright_yellow());
    // Try to pretty-print JSON, fall back to raw text
    match serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
    {
        Some(pretty) => print_body(&pretty),
        None => print_body(body),
    }

    println!("{}", "═".repeat(80).bright_green());
    println!();
}
