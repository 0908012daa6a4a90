// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: a path flag with a default
fn path_arg(id: &'static str, long: &'static str, default: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .value_name("PATH")
        .default_value(default)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("crossdock")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Crossdock Contributors")
        .about("Migrate paused Docker containers to iSulad in place")
        .arg(path_arg(
            "log",
            "log",
            "/var/log/crossdock/transform.log",
            "Log file path",
        ))
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .default_value("info")
                .value_parser(["debug", "info", "warn", "error"])
                .help("Log level"),
        )
        .arg(path_arg(
            "isulad_config_file",
            "isulad-config-file",
            "/etc/isulad/daemon.json",
            "iSulad daemon configuration file",
        ))
        .arg(path_arg(
            "docker_graph",
            "docker-graph",
            "/var/lib/docker",
            "Docker graph root",
        ))
        .arg(path_arg(
            "docker_state",
            "docker-state",
            "/var/run/docker",
            "Docker execution state root",
        ))
        .arg(path_arg(
            "docker_socket",
            "docker-socket",
            "/var/run/docker.sock",
            "Docker daemon socket",
        ))
        .arg(path_arg(
            "image_helper",
            "image-helper",
            "isulad-img-helper",
            "Program driving the iSulad image store",
        ))
        .arg(path_arg(
            "runtime_helper",
            "runtime-helper",
            "lcr-create-helper",
            "Program registering containers with the lcr runtime",
        ))
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .action(ArgAction::SetTrue)
                .conflicts_with("ids")
                .help("Transform every running Docker container"),
        )
        .arg(
            Arg::new("ids")
                .num_args(1..)
                .required_unless_present("all")
                .help("Container IDs or unique ID prefixes"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("crossdock.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
