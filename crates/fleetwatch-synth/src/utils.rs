//! Utilities for working with `synth`.

fn sha256<R: std::io::Read>(
    context: &mut ring::digest::Context,
    mut reader: R,
) -> anyhow::Result<()> {
    let mut buffer = [0; 1024];

    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        context.update(&buffer[..count]);
    }

    Ok(())
}

/// Returns every file below `dir`, sorted by path.
pub fn list_files(dir: impl AsRef<std::path::Path>) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut files = vec![];
    let mut pending = vec![dir.as_ref().to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Returns the lowercase hex sha256 digest of the file or directory at the
/// given path *if it exists*.
/// If nothing exists at the path it returns `Ok(None)`.
///
/// A directory's digest covers the relative path, length and contents of
/// every file below it, so it does not depend on timestamps or traversal
/// order.
pub fn sha256_digest(path: impl AsRef<std::path::Path>) -> anyhow::Result<Option<String>> {
    let path = path.as_ref();
    log::trace!("determining sha256 of {}", path.display());
    if !path.exists() {
        return Ok(None);
    }

    let mut context = ring::digest::Context::new(&ring::digest::SHA256);
    if path.is_dir() {
        for file in list_files(path)? {
            let relative = file.strip_prefix(path)?;
            context.update(relative.to_string_lossy().as_bytes());
            context.update(&[0]);
            let input = std::fs::File::open(&file)?;
            // the length delimits the contents from the next file's path
            let len = input.metadata()?.len();
            context.update(&len.to_le_bytes());
            sha256(&mut context, std::io::BufReader::new(input))?;
        }
    } else {
        let input = std::fs::File::open(path)?;
        sha256(&mut context, std::io::BufReader::new(input))?;
    }
    let digest = context.finish();
    Ok(Some(data_encoding::HEXLOWER.encode(digest.as_ref())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory_digest_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("handler.py"), "def lambda_handler(e, c): pass").unwrap();
        std::fs::write(dir.path().join("pkg/util.py"), "X = 1").unwrap();

        let first = sha256_digest(dir.path()).unwrap().unwrap();
        let second = sha256_digest(dir.path()).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(64, first.len());

        std::fs::write(dir.path().join("pkg/util.py"), "X = 2").unwrap();
        let third = sha256_digest(dir.path()).unwrap().unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn file_boundaries_change_the_digest() {
        let split = tempfile::tempdir().unwrap();
        std::fs::write(split.path().join("a"), "X").unwrap();
        std::fs::write(split.path().join("b"), "Y").unwrap();
        let joined = tempfile::tempdir().unwrap();
        std::fs::write(joined.path().join("a"), "Xb\0Y").unwrap();
        assert_ne!(
            sha256_digest(split.path()).unwrap(),
            sha256_digest(joined.path()).unwrap()
        );
    }

    #[test]
    fn missing_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sha256_digest(dir.path().join("nope")).unwrap().is_none());
    }
}
