use crate::db::{init_db, open_sink};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, mail_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(dir) = mail_dir {
        settings.mail_dir = shellexpand_path(&dir);
    }
    save_settings(&settings)?;

    let resolved = settings.data_dir();
    std::fs::create_dir_all(&resolved)?;
    std::fs::create_dir_all(resolved.join("exports"))?;
    std::fs::create_dir_all(settings.mail_dir())?;

    let mut sink = open_sink(&resolved)?;
    init_db(&mut sink)?;

    println!("Initialized txnscan at {}", resolved.display());
    println!("Mail directory: {}", settings.mail_dir().display());
    Ok(())
}
