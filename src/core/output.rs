//! Colored output for pawndeps
//!
//! Uses owo-colors for terminal colors. Progress bars live in
//! `helpers::internal::progress`.

use owo_colors::OwoColorize;

/// Print an action header (blue, bold)
/// Example: "==> Installing Y-Less/sscanf"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
}

/// Print an action with a reference counter (blue, bold)
/// Example: "(1/3) Y-Less/sscanf?latest"
pub fn action_numbered(current: usize, total: usize, message: &str) {
    println!(
        "{} {}",
        format!("({}/{})", current, total).cyan(),
        message.bold()
    );
}

/// Print a sub-action (cyan arrow)
/// Example: "  -> resolve"
pub fn sub_action(phase: &str) {
    println!("  {} {}", "->".cyan(), phase);
}

/// Print a detail line (dimmed)
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
}

pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message.red());
}

/// Print a skip message (dimmed)
/// Example: "==> plugin sscanf already registered, skipping"
pub fn skip(message: &str) {
    println!("{} {}", "==>".dimmed(), message.dimmed());
}

/// Print one per-reference outcome line in the batch summary
pub fn outcome(reference: &str, status: &str, ok: bool) {
    if ok {
        println!("  {} {}", reference.green(), status.dimmed());
    } else {
        println!("  {} {}", reference.red(), status.dimmed());
    }
}

/// Mask a secret for logging. At most a quarter of it, capped at 8
/// characters, stays visible.
pub fn mask_token(token: &str) -> String {
    let shown = (token.chars().count() / 4).min(8);
    let visible: String = token.chars().take(shown).collect();
    format!("{}****", visible)
}
