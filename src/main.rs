use std::fmt::Write as _;
use std::fs;
use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use wasm1_interpreter::{Interpreter, Module};

fn main() -> ExitCode {
	init_tracing();

	let mut args = std::env::args().skip(1);
	let Some(path) = args.next() else {
		eprintln!("usage: wasm1_interpreter <module-path> [export-name [arg...]]");
		return ExitCode::FAILURE;
	};
	let export_name = args.next();
	let export_args: Vec<String> = args.collect();

	match run(&path, export_name.as_deref(), &export_args) {
		Ok(output) => {
			if let Some(output) = output {
				println!("{output}");
			}
			ExitCode::SUCCESS
		}
		Err(message) => {
			eprintln!("error: {message}");
			ExitCode::FAILURE
		}
	}
}

fn run(path: &str, export_name: Option<&str>, export_args: &[String]) -> Result<Option<String>, String> {
	let file = fs::File::open(path).map_err(|e| format!("opening {path}: {e}"))?;
	let module = Module::decode(file).map_err(|e| format!("decoding {path}: {e}"))?;

	let Some(name) = export_name else {
		return Ok(Some(format!("{} exports", module.exports.len())));
	};

	let interpreter = Interpreter::new(&module);
	let result = interpreter.run_exported(name, export_args).map_err(|e| e.to_string())?;
	Ok(result.map(|value| {
		let mut out = String::new();
		let _ = write!(out, "{value:?}");
		out
	}))
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	let tree = tracing_tree::HierarchicalLayer::new(2).with_indent_lines(true).with_targets(true);
	let _ = Registry::default().with(filter).with(tree).try_init();
}
