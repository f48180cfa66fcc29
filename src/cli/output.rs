use console::style;
use std::fmt::Display;

/// Centralized output formatting utilities for consistent CLI presentation
pub struct Output;

impl Output {
    /// Print a success message with checkmark
    pub fn success<T: Display>(message: T) {
        println!("{} {}", style("✓").green(), message);
    }

    /// Print a warning message
    pub fn warning<T: Display>(message: T) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    /// Print an info message
    pub fn info<T: Display>(message: T) {
        println!("{} {}", style("ℹ").cyan(), message);
    }

    /// Print a sub-item with arrow prefix
    pub fn sub_item<T: Display>(message: T) {
        println!("  {} {}", style("→").dim(), message);
    }

    /// Print a section header
    pub fn section<T: Display>(title: T) {
        println!("\n{}", style(title).bold().underlined());
    }

    /// Print a tip/suggestion
    pub fn tip<T: Display>(message: T) {
        println!("{} {}", style("TIP:").cyan(), style(message).dim());
    }

    /// One repository line: fullname, then clone URL dimmed
    pub fn repo_line(fullname: &str, clone_url: &str) {
        println!("  {} {}", style(fullname).cyan(), style(clone_url).dim());
    }

    /// One branch line, default branch highlighted
    pub fn branch_line(name: &str, latest_commit: &str, is_default: bool) {
        let short: String = latest_commit.chars().take(12).collect();
        if is_default {
            println!(
                "  {} {} {}",
                style(name).green().bold(),
                style(short).dim(),
                style("(default)").green()
            );
        } else {
            println!("  {} {}", name, style(short).dim());
        }
    }

    /// One commit status line, colored by state
    pub fn status_line(state: &str, description: &str, when: impl Display) {
        let state = match state {
            "SUCCESSFUL" => style(state).green(),
            "INPROGRESS" => style(state).yellow(),
            _ => style(state).red(),
        };
        println!("  {state:<12} {description} {}", style(when).dim());
    }
}
