use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Folder inside the output directory that receives the run logs.
pub const LOG_DIR: &str = "logs";

fn log_path(output_dir: &Path, filename: &str) -> io::Result<PathBuf> {
    let log_dir = output_dir.join(LOG_DIR);
    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)?;
    }
    Ok(log_dir.join(filename))
}

/// Appends a timestamped entry to `<output_dir>/logs/<filename>`.
pub fn log_to_file(output_dir: &Path, filename: &str, message: &str) -> io::Result<()> {
    let path = log_path(output_dir, filename)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "\n--- Log entry at {} ---", timestamp)?;
    writeln!(file, "{}", message)?;
    writeln!(file, "--- End of entry ---\n")?;
    file.flush()?;

    Ok(())
}

pub fn log_with_header(
    output_dir: &Path,
    filename: &str,
    header: &str,
    message: &str,
) -> io::Result<()> {
    let formatted_message = format!(
        "===== {} =====\n{}\n====================",
        header, message
    );
    log_to_file(output_dir, filename, &formatted_message)
}

/// Appends rows to a CSV file in the log folder, writing the header only when
/// the file is new.
pub fn log_csv<R: AsRef<[String]>>(
    output_dir: &Path,
    filename: &str,
    headers: &[&str],
    rows: &[R],
) -> io::Result<()> {
    let path = log_path(output_dir, filename)?;
    let file_exists = path.exists();

    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let mut writer = csv::Writer::from_writer(file);

    if !file_exists && !headers.is_empty() {
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.write_record(row.as_ref())?;
    }
    writer.flush()?;

    Ok(())
}
