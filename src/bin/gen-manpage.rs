//! Writes man pages for fpgaflash and each of its subcommands
//!
//! Usage: gen-manpage [output-dir]   (default: ./man)

use clap::CommandFactory;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[allow(dead_code)]
#[path = "../cli.rs"]
mod cli;

fn render(cmd: clap::Command, dir: &Path) -> io::Result<PathBuf> {
    let name = cmd
        .get_display_name()
        .unwrap_or_else(|| cmd.get_name())
        .to_string();
    let mut page = Vec::new();
    clap_mangen::Man::new(cmd).render(&mut page)?;

    let path = dir.join(format!("{}.1", name));
    fs::write(&path, page)?;
    Ok(path)
}

fn main() -> io::Result<()> {
    let dir = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("man"), PathBuf::from);
    fs::create_dir_all(&dir)?;

    // build() fills in display names such as "fpgaflash-program"
    let mut cmd = cli::Cli::command();
    cmd.build();

    let mut written = vec![render(cmd.clone(), &dir)?];
    for sub in cmd.get_subcommands() {
        written.push(render(sub.clone(), &dir)?);
    }

    for path in &written {
        println!("{}", path.display());
    }
    println!(
        "\n{} page(s) written; view one with `man -l {}`",
        written.len(),
        written[0].display()
    );

    Ok(())
}
