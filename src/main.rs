use std::io;
use std::process;

use rowlite::repl;
use rowlite::Table;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        println!("Must supply a database filename.");
        process::exit(1);
    };

    let mut table = match Table::open(path) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error: unable to open database \"{path}\": {e}");
            process::exit(1);
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = repl::run(&mut table, &mut stdin.lock(), &mut stdout.lock()) {
        // Keep whatever made it to the pager before the failure.
        let _ = table.close();
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
