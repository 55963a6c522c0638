use log::{Level, LevelFilter};
use std::io::Write;
use std::process::ExitCode;
use std::{env, fs, io};
use vm32::logging::VmLogger;
use vm32::Vm;

static LOGGER: VmLogger = VmLogger::new(Level::Trace);

fn usage() {
    eprintln!("usage: vm32 [--debug] <image>");
    eprintln!("  --debug   capture container debug symbols for fault reports");
    eprintln!("environment: VM32_LOG=error|warn|info|debug|trace (default info)");
}

fn main() -> ExitCode {
    let filter = env::var("VM32_LOG")
        .ok()
        .and_then(|value| value.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);
    if LOGGER.install(filter).is_err() {
        eprintln!("vm32: logger already installed");
    }

    let mut debug = false;
    let mut image_path = None;
    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--debug" => debug = true,
            "--help" | "-h" => {
                usage();
                return ExitCode::SUCCESS;
            }
            _ => image_path = Some(arg),
        }
    }
    let Some(path) = image_path else {
        usage();
        return ExitCode::FAILURE;
    };

    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(error) => {
            eprintln!("vm32: cannot read {path}: {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut vm = Vm::new();
    vm.set_debug_mode(debug);
    if let Err(error) = vm.load(&bytes) {
        eprintln!("vm32: cannot load {path}: {error}");
        return ExitCode::from(error.code().value());
    }

    match vm.run() {
        Ok(()) => ExitCode::from(vm.exit_code() as u8),
        Err(error) => {
            let mut stderr = io::stderr();
            let _ = writeln!(stderr, "vm32: execution stopped: {error}");
            let _ = vm.dump_state(&mut stderr);
            ExitCode::from(error.code().value())
        }
    }
}
