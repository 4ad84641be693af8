use std::env;
use std::fs::File;
use std::io::BufReader;
use std::sync::mpsc;
use std::thread;

use sql_migrate::location::Location;
use sql_migrate::{split_reader, Config};

/// Split specified migrations (`file://` URIs or plain paths) and print all statements.
fn main() {
    env_logger::init();
    let config = Config::default();
    for arg in env::args().skip(1) {
        let path = match arg.parse::<Location>() {
            Ok(Location::File(path)) => path,
            Ok(location) => {
                eprintln!("Err: cannot read {} from here", location);
                continue;
            }
            Err(_) => arg.clone().into(),
        };
        println!("{}", path.display());
        let f = match File::open(&path) {
            Ok(f) => f,
            Err(err) => {
                eprintln!("Err: {} in {}", err, arg);
                continue;
            }
        };
        let (tx, rx) = mpsc::channel();
        let printer = thread::spawn(move || {
            for stmt in rx {
                println!("{}", stmt);
            }
        });
        if let Err(err) = split_reader(BufReader::new(f), tx, &config) {
            eprintln!("Err: {} in {}", err, arg);
        }
        printer.join().unwrap();
    }
}
