//! The `mkfs-a1fs` tool formats an image file into an a1fs filesystem.
//!
//! The image file must exist and its size must be a positive multiple of the
//! block size.

use a1fs::BLOCK_SIZE;
use a1fs::ByteSize;
use a1fs::ImageMap;
use std::env;
use std::env::ArgsOs;
use std::fmt;
use std::io;
use std::io::Write;
use std::path::PathBuf;
use std::process::exit;

/// Structure storing command line arguments.
#[derive(Default)]
struct Args {
    /// Number of inodes in the new filesystem.
    n_inodes: u32,
    /// If true, print command line help.
    help: bool,
    /// If true, overwrite an existing filesystem.
    force: bool,
    /// If true, sync the image file contents to disk before exiting.
    sync: bool,
    /// If true, print details about the created filesystem.
    verbose: bool,
    /// If true, zero out the image contents before formatting.
    zero: bool,
    /// The path to the image file to format.
    img_path: Option<PathBuf>,
}

/// Writes an error to stderr, then exits.
fn error<M: fmt::Display>(msg: M) -> ! {
    eprintln!("mkfs-a1fs: error: {msg}");
    exit(1);
}

/// Prints command help to `out`: stdout when help was requested, stderr on
/// bad usage.
fn print_help(out: &mut dyn Write) {
    let _ = write!(
        out,
        "\
Usage: mkfs-a1fs options image

Format the image file into an a1fs filesystem. The file must exist and
its size must be a multiple of the a1fs block size, {BLOCK_SIZE} bytes.

Options:
    -i num  number of inodes; required argument
    -h      print help and exit
    -f      force format, overwriting an existing a1fs filesystem
    -s      sync image file contents to disk
    -v      verbose output
    -z      zero out image contents
"
    );
}

fn parse_args(mut args: ArgsOs) -> Option<Args> {
    let mut res: Args = Default::default();
    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("-i") => {
                let count = args
                    .next()
                    .and_then(|s| s.into_string().ok())
                    .and_then(|s| s.parse::<u32>().ok())?;
                res.n_inodes = count;
            }
            Some("-h" | "--help") => {
                res.help = true;
                // Skip the remaining arguments.
                return Some(res);
            }
            Some("-f") => res.force = true,
            Some("-s") => res.sync = true,
            Some("-v") => res.verbose = true,
            Some("-z") => res.zero = true,
            Some(opt) if opt.starts_with('-') => return None,
            _ => res.img_path = Some(PathBuf::from(arg)),
        }
    }
    if res.img_path.is_none() || res.n_inodes == 0 {
        return None;
    }
    Some(res)
}

fn main() {
    let mut args = env::args_os();
    // Skip the binary name.
    args.next();
    let Some(args) = parse_args(args) else {
        // Invalid arguments, print help to stderr.
        print_help(&mut io::stderr());
        exit(1);
    };
    if args.help {
        print_help(&mut io::stdout());
        exit(0);
    }
    let img_path = args.img_path.unwrap();
    let mut image = ImageMap::open(&img_path).unwrap_or_else(|e| {
        error(format_args!("{}: {e}", img_path.display()));
    });
    if !args.force && a1fs::is_present(&image) {
        error(format_args!(
            "{} already contains a1fs; use -f to overwrite",
            img_path.display()
        ));
    }
    if args.zero {
        image.fill(0);
    }
    a1fs::format(&mut image, args.n_inodes).unwrap_or_else(|e| {
        error(format_args!("failed to format the image: {e}"));
    });
    if args.verbose {
        let blocks = image.len() / BLOCK_SIZE;
        println!(
            "created a1fs on {}: {} ({blocks} blocks, {} inodes)",
            img_path.display(),
            ByteSize(image.len() as u64),
            args.n_inodes,
        );
    }
    if args.sync {
        image.sync().unwrap_or_else(|e| {
            error(format_args!("msync: {e}"));
        });
    }
}
