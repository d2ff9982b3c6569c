//! Configuration collection tests

use secrecy::ExposeSecret;
use slotprov::config::collector::{ConfigCollector, Confirmation, ScriptedPrompter};
use slotprov::config::record::{BotLogLevel, RecordFile, SourceLocation};
use slotprov::errors::ProvisionError;

#[test]
fn test_local_install_with_defaults() {
    // source, key, token, chat id, sheets, interval, log level, confirm
    let mut prompter =
        ScriptedPrompter::new(["", "wbkey123", "tok:abcdef", "-100555", "", "", "", "y"]);

    let outcome = ConfigCollector::new(&mut prompter)
        .collect_record(None)
        .unwrap();

    let record = match outcome {
        Confirmation::Confirmed(record) => record,
        Confirmation::Cancelled => panic!("expected confirmation"),
    };
    assert_eq!(record.source(), &SourceLocation::Local);
    assert_eq!(record.wb_api_key().expose_secret(), "wbkey123");
    assert_eq!(record.bot_token().expose_secret(), "tok:abcdef");
    assert_eq!(record.chat_id(), "-100555");
    assert_eq!(record.sheets_url(), None);
    assert_eq!(record.check_interval_secs(), 120);
    assert_eq!(record.log_level(), BotLogLevel::Info);
    assert_eq!(prompter.remaining(), 0);
}

#[test]
fn test_summary_masks_secrets() {
    let mut prompter = ScriptedPrompter::new([
        "",
        "wb-secret-key-0123456789",
        "tok:abcdef",
        "-100555",
        "",
        "",
        "",
        "y",
    ]);
    ConfigCollector::new(&mut prompter)
        .collect_record(None)
        .unwrap();

    let shown = prompter.shown().join("\n");
    assert!(shown.contains("wb-secre..."));
    assert!(!shown.contains("wb-secret-key-0123456789"));
    assert!(!shown.contains("tok:abcdef"));
    assert!(shown.contains("tok:abcd..."));
}

#[test]
fn test_empty_secret_reprompts() {
    let mut prompter = ScriptedPrompter::new([
        "", "", "  ", "wbkey123", "tok:abcdef", "-100555", "", "", "", "y",
    ]);

    let outcome = ConfigCollector::new(&mut prompter)
        .collect_record(None)
        .unwrap();

    assert!(matches!(outcome, Confirmation::Confirmed(_)));
    let wb_questions = prompter
        .questions()
        .iter()
        .filter(|q| q.as_str() == "WB API key")
        .count();
    assert_eq!(wb_questions, 3);
    assert!(prompter
        .shown()
        .iter()
        .any(|line| line == "WB API key is required"));
}

#[test]
fn test_anything_but_y_cancels() {
    for answer in ["n", "", "yes", "Y "] {
        let mut prompter =
            ScriptedPrompter::new(["", "wbkey123", "tok:abcdef", "-100555", "", "", "", answer]);
        let outcome = ConfigCollector::new(&mut prompter)
            .collect_record(None)
            .unwrap();

        // "Y " trims to a plain y
        if answer == "Y " {
            assert!(matches!(outcome, Confirmation::Confirmed(_)));
        } else {
            assert!(matches!(outcome, Confirmation::Cancelled), "{:?}", answer);
        }
    }
}

#[test]
fn test_invalid_repository_url_reprompts() {
    let mut prompter = ScriptedPrompter::new([
        "--upload-pack=evil",
        "https://github.com/acme/wb-bot.git",
        "",
        "y",
    ]);

    let outcome = ConfigCollector::new(&mut prompter).collect_source().unwrap();
    match outcome {
        Confirmation::Confirmed(SourceLocation::Remote { url, branch }) => {
            assert_eq!(url, "https://github.com/acme/wb-bot.git");
            assert_eq!(branch, "main");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn test_installed_source_skips_source_questions() {
    let mut prompter =
        ScriptedPrompter::new(["wbkey123", "tok:abcdef", "-100555", "", "60", "warn", "y"]);

    let outcome = ConfigCollector::new(&mut prompter)
        .collect_record(Some(SourceLocation::Installed))
        .unwrap();

    match outcome {
        Confirmation::Confirmed(record) => {
            assert_eq!(record.source(), &SourceLocation::Installed);
            assert_eq!(record.check_interval_secs(), 60);
            assert_eq!(record.log_level(), BotLogLevel::Warning);
        }
        Confirmation::Cancelled => panic!("expected confirmation"),
    }
    assert!(!prompter
        .questions()
        .iter()
        .any(|q| q.starts_with("Git repository URL")));
}

#[tokio::test]
async fn test_record_file_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("record.json");

    std::fs::write(
        &path,
        r#"{
            "repo_url": "https://github.com/acme/wb-bot.git",
            "wb_api_key": "wbkey123",
            "telegram_bot_token": "tok:abcdef",
            "telegram_chat_id": "-100555",
            "log_level": "DEBUG"
        }"#,
    )
    .unwrap();
    let record = RecordFile::load(&path).await.unwrap().into_record(None).unwrap();
    assert_eq!(
        record.source(),
        &SourceLocation::Remote {
            url: "https://github.com/acme/wb-bot.git".to_string(),
            branch: "main".to_string(),
        }
    );
    assert_eq!(record.log_level(), BotLogLevel::Debug);

    // No re-prompt without a terminal: an empty secret is an error
    std::fs::write(
        &path,
        r#"{"wb_api_key": "", "telegram_bot_token": "t", "telegram_chat_id": "1"}"#,
    )
    .unwrap();
    let err = RecordFile::load(&path)
        .await
        .unwrap()
        .into_record(None)
        .unwrap_err();
    assert!(matches!(err, ProvisionError::InputError(_)));

    std::fs::write(&path, r#"{"wb_api_key": "k", "surprise": true}"#).unwrap();
    let err = RecordFile::load(&path).await.unwrap_err();
    assert!(matches!(err, ProvisionError::InputError(_)));
}
