//! Colored terminal logging. Informational progress goes to stdout; warnings
//! and errors go to stderr so build output stays pipeable.

use colored::Colorize;

pub fn info(message: &str) {
    println!("{} {}", "[minipress]".bright_blue().bold(), message);
}

pub fn warn(message: &str) {
    eprintln!("{} {}", "[warn]".bright_yellow().bold(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", "[error]".bright_red().bold(), message);
}
