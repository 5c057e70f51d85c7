use std::{
    fs::{create_dir_all, exists, metadata, read, read_dir, remove_file, write},
    path::PathBuf,
};

use anyhow;
use rand::random;

// startup sanity checks
//
// these run before the listener binds so that misconfiguration fails loudly
// instead of turning into per-request errors later

pub fn readable_dir(dir: &PathBuf) -> anyhow::Result<()> {
    if !dir.is_absolute() {
        return Err(anyhow::Error::msg("must pass absolute path to readable_dir"));
    }

    if !metadata(dir)?.is_dir() {
        return Err(anyhow::Error::msg(format!("{dir:?} is not a directory")));
    }

    // enumerating the root is all the scanner needs
    read_dir(dir)?;

    Ok(())
}

pub fn writable_dir(dir: &PathBuf) -> anyhow::Result<()> {
    if !dir.is_absolute() {
        return Err(anyhow::Error::msg("must pass absolute path to writable_dir"));
    }

    create_dir_all(dir)?;

    create_temp_file(dir)
}

fn create_temp_file(dir: &PathBuf) -> anyhow::Result<()> {
    // this ensures that we create a new file
    let mut filename = dir.join(random::<i64>().to_string());
    let mut count = 0;

    while exists(&filename)? {
        filename = dir.join(random::<i64>().to_string());

        if count < 10 {
            count += 1;
        } else {
            return Err(anyhow::Error::msg(format!(
                "create_temp_file failed to find unique filename ten times for directory {dir:?}"
            )));
        }
    }

    // mock data to make sure that we can read any file we create
    let data = random::<i64>().to_ne_bytes();

    write(&filename, data)?;

    if read(&filename)? != data {
        return Err(anyhow::Error::msg(format!(
            "data readback failed on {filename:?}"
        )));
    }

    remove_file(&filename)?;

    Ok(())
}
