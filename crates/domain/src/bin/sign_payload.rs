use std::env;
use std::fs;
use std::process;

use transfer_watch_domain::signature::compute_signature;

fn main() {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("Usage: sign_payload <payload.json> [secret]");
        eprintln!("       secret defaults to $WEBHOOK_SECRET");
        process::exit(1);
    };

    let Some(secret) = args.next().or_else(|| env::var("WEBHOOK_SECRET").ok()) else {
        eprintln!("no secret given and WEBHOOK_SECRET is unset");
        process::exit(1);
    };

    // Sign the file bytes untouched; any reformatting invalidates the MAC.
    let body = match fs::read(&path) {
        Ok(body) => body,
        Err(err) => {
            eprintln!("failed to read {path}: {err}");
            process::exit(1);
        }
    };

    match compute_signature(&body, secret.as_bytes()) {
        Ok(signature) => println!("{signature}"),
        Err(err) => {
            eprintln!("failed to sign payload: {err}");
            process::exit(1);
        }
    }
}
