use clap::Parser;
use std::fs;
use std::path::PathBuf;

use rylox::backend::vm::std_lib::native_clock;
use rylox::backend::vm::{InterpretResult, LogLevel, VirtualMachine};

#[derive(Parser)]
#[command(name = "rylox")]
#[command(version = "0.1.0")]
#[command(about = "Rylox: a single-pass bytecode compiler and VM for the Lox language", long_about = None)]
struct Cli {
    input: PathBuf,

    #[arg(short, long, value_enum, default_value_t = LogLevel::Release)]
    mode: LogLevel,

    /// Collect garbage at every instruction boundary.
    #[arg(long)]
    gc_stress: bool,
}

fn main() {
    let cli = Cli::parse();
    let file_path = &cli.input;

    let source = match fs::read_to_string(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("[Error] Cannot read source file {}: {}", file_path.display(), err);
            std::process::exit(74);
        }
    };

    if cli.mode != LogLevel::Release {
        println!("[Rylox] Compiling: {}", file_path.display());
    }

    let mut vm = VirtualMachine::new();
    vm.log_level = cli.mode;
    vm.heap.gc_stress = cli.gc_stress;
    vm.define_native("clock", native_clock);

    let result = vm.interpret(&source);

    if cli.mode != LogLevel::Release {
        println!(
            "[Rylox] Peak heap usage: {} bytes ({} still live).",
            vm.heap.max_allocated, vm.heap.bytes_allocated
        );
    }
    if cli.mode == LogLevel::Trace {
        vm.dump_internal_state();
    }

    match result {
        InterpretResult::Ok => {}
        InterpretResult::CompileError => std::process::exit(65),
        InterpretResult::RuntimeError => std::process::exit(70),
    }
}
