//! Terminal command parsing.

use std::path::PathBuf;

use client_core::routing::{SIGN_IN_PATH, SIGN_UP_PATH};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Email(String),
    Password(String),
    Confirm(String),
    Submit,
    Google,
    /// Callback address of a redirect sign-in finished in the browser.
    Callback(String),
    Navigate(&'static str),
    Select(PathBuf),
    Drop(PathBuf),
    JobDescription(String),
    Dismiss,
    Status,
    Logout,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse(line: &str) -> Command {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_ascii_lowercase().as_str() {
        "" => Command::Empty,
        "email" => Command::Email(rest.to_string()),
        "password" => Command::Password(rest.to_string()),
        "confirm" => Command::Confirm(rest.to_string()),
        "submit" | "analyze" => Command::Submit,
        "google" => Command::Google,
        "callback" if !rest.is_empty() => Command::Callback(rest.to_string()),
        "signup" => Command::Navigate(SIGN_UP_PATH),
        "login" | "signin" => Command::Navigate(SIGN_IN_PATH),
        "select" | "open" if !rest.is_empty() => Command::Select(PathBuf::from(rest)),
        "drop" if !rest.is_empty() => Command::Drop(PathBuf::from(rest)),
        "jd" => Command::JobDescription(rest.to_string()),
        "dismiss" | "close" => Command::Dismiss,
        "status" => Command::Status,
        "logout" => Command::Logout,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    }
}

pub fn help(signed_in: bool) -> &'static str {
    if signed_in {
        "commands:\n  \
         select <path>   choose a PDF resume\n  \
         drop <path>     same as select, as if dragged onto the window\n  \
         jd <text>       set the job description (no text: multi-line, end with '.')\n  \
         submit          upload and analyze\n  \
         dismiss         close the score result\n  \
         status          show the current draft\n  \
         logout          sign out\n  \
         quit"
    } else {
        "commands:\n  \
         email <address>\n  \
         password <password>\n  \
         confirm <password>   (sign-up only)\n  \
         submit               sign in / create the account\n  \
         google               continue with Google\n  \
         callback <address>   finish a Google sign-in completed in the browser\n  \
         signup | login       switch form\n  \
         quit"
    }
}
