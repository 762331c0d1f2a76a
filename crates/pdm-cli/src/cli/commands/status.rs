//! `pdm status` – show all downloads.

use anyhow::Result;
use pdm_core::store::InfoAndPieces;
use pdm_core::Engine;

use super::human_bytes;

pub async fn run_status(engine: &Engine, json: bool) -> Result<()> {
    let downloads = engine.store().get_all_info_and_pieces().await?;
    if json {
        for d in &downloads {
            println!("{}", status_json(d));
        }
        return Ok(());
    }
    if downloads.is_empty() {
        println!("No downloads in database.");
        return Ok(());
    }
    println!(
        "{:<8} {:<18} {:>10} {:>10} {:>6}  {}",
        "ID", "STATUS", "DONE", "SIZE", "PIECES", "NAME"
    );
    for d in downloads {
        let info = &d.info;
        println!(
            "{:<8} {:<18} {:>10} {:>10} {:>6}  {}",
            &info.id.to_string()[..8],
            info.status_code.label(),
            human_bytes(d.downloaded_bytes()),
            human_bytes(info.total_bytes),
            info.num_pieces,
            info.file_name
        );
        if let Some(msg) = &info.status_msg {
            println!("         {}", msg);
        }
    }
    Ok(())
}

fn status_json(d: &InfoAndPieces) -> serde_json::Value {
    let info = &d.info;
    serde_json::json!({
        "id": info.id.to_string(),
        "url": info.url,
        "dir": info.dir_path,
        "name": info.file_name,
        "status": info.status_code.code(),
        "status_label": info.status_code.label(),
        "message": info.status_msg,
        "downloaded_bytes": d.downloaded_bytes(),
        "total_bytes": info.total_bytes,
        "pieces": info.num_pieces,
        "num_failed": info.num_failed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdm_core::store::DownloadInfo;

    #[test]
    fn json_row_carries_progress_and_status() {
        let mut info = DownloadInfo::new("http://h/a.bin", "/tmp", "a.bin");
        info.total_bytes = 100;
        let pieces = info.make_pieces();
        let d = InfoAndPieces { info, pieces };
        let v = status_json(&d);
        assert_eq!(v["name"], "a.bin");
        assert_eq!(v["total_bytes"], 100);
        assert_eq!(v["downloaded_bytes"], 0);
        assert_eq!(v["status"], 190);
    }
}
