mod cli;

use std::error::Error;
use std::fs;
use std::io;
use std::path::Path;

use clap::Parser;
use imgfs::{FileSystem, OpenFlag, Principal};

pub use self::cli::Cli;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    log::info!(
        "out={:?} size={} block_size={}",
        cli.out,
        cli.size,
        cli.block_size
    );

    let mut fs = FileSystem::init_partition(&cli.out, cli.size, cli.block_size)?;

    if let Some(source) = &cli.source {
        create_dir_all(&mut fs, &cli.dest)?;
        fs.chown(&cli.dest, cli.uid, cli.gid)?;
        fs.set_principal(Principal::new(cli.uid, cli.gid));
        pack_dir(&mut fs, source, &cli.dest)?;
    }
    fs.flush()?;

    println!(
        "{:?}: {} of {} data blocks free, {} inodes free",
        cli.out,
        fs.free_blocks(),
        fs.data_blocks(),
        fs.free_inodes()
    );
    Ok(())
}

fn create_dir_all(fs: &mut FileSystem, path: &str) -> imgfs::Result<()> {
    let mut current = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        match fs.create_directory(&current, 0o755) {
            Ok(_) | Err(imgfs::Error::AlreadyExists) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

fn pack_dir(fs: &mut FileSystem, host_dir: &Path, dest: &str) -> Result<(), Box<dyn Error>> {
    let mut entries = fs::read_dir(host_dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name().into_string().map_err(|name| {
            io::Error::new(io::ErrorKind::InvalidData, format!("non UTF-8 name {name:?}"))
        })?;
        let target = join(dest, &name);
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            log::info!("dir={target:?}");
            fs.create_directory(&target, 0o755)?;
            pack_dir(fs, &entry.path(), &target)?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            let link = link.to_str().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("non UTF-8 link {link:?}"))
            })?;
            log::info!("symlink={target:?} -> {link:?}");
            fs.create_soft_link(link, &target)?;
        } else {
            let data = fs::read(entry.path())?;
            log::info!("file={target:?} ({} bytes)", data.len());
            let fd = fs.open_file(
                &target,
                OpenFlag::WRONLY | OpenFlag::CREATE | OpenFlag::TRUNC,
                0o644,
            )?;
            fs.write(fd, &data)?;
            fs.close(fd)?;
        }
    }
    Ok(())
}
