//! Minimal tsu-stack example — a request-validation pipeline.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example pipeline
//!
//! Each incoming "request" is a list of header lines. The stack trims them,
//! rejects requests without an auth header, and maps failures to a status
//! line in a final error-aware step.

use tokio::sync::mpsc;

use tsu_stack::{Error, Next, Stack};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = Stack::<String>::new()
        .then(normalize)
        .then(require_auth)
        .then(load_user)
        .recover(to_status);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = app.compose(move |err, lines| {
        let _ = tx.send((err, lines));
    });

    let requests = [
        vec!["  Authorization: token-42 ".to_owned(), "Accept: */*".to_owned()],
        vec!["Accept: */*".to_owned()],
    ];
    for request in &requests {
        handle.call(request.clone());
    }

    // load_user continues from a spawned task, so wait for every response.
    for _ in 0..requests.len() {
        match rx.recv().await {
            Some((Some(err), _)) => eprintln!("unhandled: {err}"),
            Some((None, lines)) => println!("{}\n", lines.join("\n")),
            None => break,
        }
    }
}

// Trim every line. The trimmed list replaces the arguments for later steps.
fn normalize(lines: Vec<String>, next: Next<String>) {
    next.with(lines.iter().map(|l| l.trim().to_owned()).collect());
}

fn require_auth(lines: Vec<String>, next: Next<String>) {
    if lines.iter().any(|l| l.to_ascii_lowercase().starts_with("authorization:")) {
        next.call();
    } else {
        next.fail(Error::msg("missing authorization header"));
    }
}

// Pretend to hit a user store, continuing once the lookup finishes.
fn load_user(mut lines: Vec<String>, next: Next<String>) {
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        lines.push("X-User: alice".to_owned());
        next.with(lines);
    });
}

// 200 on success, 401 on failure. Clears the error either way.
fn to_status(err: Option<Error>, mut lines: Vec<String>, next: Next<String>) {
    let status = match err {
        None => "HTTP/1.1 200 OK".to_owned(),
        Some(err) => {
            lines.clear();
            format!("HTTP/1.1 401 Unauthorized ({err})")
        }
    };
    lines.insert(0, status);
    next.with(lines);
}
