//! End-to-end tests for logger construction, enrichment and output

#[cfg(test)]
mod integration_tests {
    use crate::{
        config::{FileOutputConfig, LoggerConfig, Severity},
        context::RequestContext,
        hooks::{self, Record, WriterHook},
        logger::Logger,
        rotation::LogFileManager,
        sink::SharedBuffer,
    };
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn production_config(buffer: &SharedBuffer) -> LoggerConfig {
        let mut config = LoggerConfig::for_service("payments", "ledger");
        config.version = "2.0.1".to_string();
        config.environment = "production".to_string();
        config.with_output(buffer.sink())
    }

    #[test]
    fn test_structured_output_carries_identity() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(production_config(&buffer));

        logger.info("Service started");

        let records = buffer.json_records();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record["message"], "Service started");
        assert_eq!(record["level"], "info");
        assert_eq!(record["business"], "payments");
        assert_eq!(record["service"], "ledger");
        assert_eq!(record["version"], "2.0.1");
        assert_eq!(record["environment"], "production");
        assert!(record["hostname"].is_string());
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn test_every_non_development_environment_is_structured() {
        for environment in ["staging", "production", "", "Development"] {
            let buffer = SharedBuffer::new();
            let mut config = production_config(&buffer);
            config.environment = environment.to_string();

            Logger::new(config).warn("structured?");

            let records = buffer.json_records();
            assert_eq!(records.len(), 1, "environment {:?}", environment);
            assert_eq!(records[0]["environment"], environment);
        }
    }

    #[test]
    fn test_development_output_is_text() {
        let buffer = SharedBuffer::new();
        let config = LoggerConfig::for_service("payments", "ledger").with_output(buffer.sink());

        Logger::new(config).info("Listening");

        let contents = buffer.contents();
        assert!(contents.contains("Listening"));
        assert!(contents.contains("service"));
        assert!(buffer.json_records().is_empty());
    }

    #[test]
    fn test_enrichment_never_mutates_receiver() {
        let buffer = SharedBuffer::new();
        let base = Logger::new(production_config(&buffer));

        let ctx = RequestContext::new()
            .with_request_id("req-1")
            .with_user_id("user-1")
            .with_trace_id("trace-1");
        let mut extra = HashMap::new();
        extra.insert("tenant", json!("acme"));

        let enriched = base
            .with_field("order_id", 991)
            .with_fields(extra)
            .with_context(&ctx);

        enriched.info("enriched");
        base.info("plain");

        let records = buffer.json_records();
        assert_eq!(records[0]["order_id"], 991);
        assert_eq!(records[0]["tenant"], "acme");
        assert_eq!(records[0]["request_id"], "req-1");

        let plain = &records[1];
        for key in ["order_id", "tenant", "request_id", "user_id", "trace_id"] {
            assert!(plain.get(key).is_none(), "{} leaked into base handle", key);
        }
    }

    #[test]
    fn test_with_context_adds_only_present_keys() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(production_config(&buffer));

        let ctx = RequestContext::new().with_request_id("abc123");
        let scoped = logger.with_context(&ctx);

        assert_eq!(scoped.fields()["request_id"], json!("abc123"));
        assert!(!scoped.fields().contains_key("user_id"));
        assert!(!scoped.fields().contains_key("trace_id"));

        scoped.info("scoped");
        let record = &buffer.json_records()[0];
        assert_eq!(record["request_id"], "abc123");
        assert!(record.get("user_id").is_none());
        assert!(record.get("trace_id").is_none());
    }

    #[test]
    fn test_context_convenience_methods() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(production_config(&buffer));
        let ctx = RequestContext::new().with_user_id("u-9").with_trace_id("t-3");

        logger.info_with_context(&ctx, "Profile loaded");
        logger.error_with_context(&ctx, "timeout after 30s", "Profile sync failed");

        let records = buffer.json_records();
        assert_eq!(records[0]["user_id"], "u-9");
        assert_eq!(records[1]["trace_id"], "t-3");
        assert_eq!(records[1]["error"], "timeout after 30s");
        assert_eq!(records[1]["level"], "error");
        assert!(logger.fields().get("user_id").is_none());
    }

    #[test]
    fn test_hooks_fire_in_order_for_subscribed_levels() {
        let buffer = SharedBuffer::new();
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let seen = Arc::clone(&seen);
            hooks::from_fn(move |record: &Record| {
                seen.lock().unwrap().push(format!("first:{}", record.message));
                Ok(())
            })
        };
        let errors_only = {
            let seen = Arc::clone(&seen);
            hooks::from_fn(move |record: &Record| {
                seen.lock().unwrap().push(format!("errors:{}", record.message));
                Ok(())
            })
            .with_levels(&[Severity::Error])
        };

        let config = production_config(&buffer).with_hook(first).with_hook(errors_only);
        let logger = Logger::new(config);

        logger.info("one");
        logger.error("bad input", "two");

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:one", "first:two", "errors:two"]
        );
    }

    #[test]
    fn test_hook_sees_bound_fields() {
        let buffer = SharedBuffer::new();
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let hook = {
            let captured = Arc::clone(&captured);
            hooks::from_fn(move |record: &Record| {
                *captured.lock().unwrap() = record.field("request_id").cloned();
                Ok(())
            })
        };

        let logger = Logger::new(production_config(&buffer).with_hook(hook));
        logger
            .with_context(&RequestContext::new().with_request_id("r-77"))
            .warn("slow query");

        assert_eq!(*captured.lock().unwrap(), Some(json!("r-77")));
    }

    #[test]
    fn test_failing_hook_does_not_block_output() {
        let buffer = SharedBuffer::new();
        let failing = hooks::from_fn(|_: &Record| Err(anyhow::anyhow!("hook backend down")));

        let logger = Logger::new(production_config(&buffer).with_hook(failing));
        logger.info("still written");

        assert_eq!(buffer.json_records()[0]["message"], "still written");
    }

    #[test]
    fn test_writer_hook_duplicates_errors() {
        let buffer = SharedBuffer::new();
        let errors = SharedBuffer::new();
        let hook = WriterHook::new(errors.sink(), &[Severity::Error, Severity::Fatal]);

        let logger = Logger::new(production_config(&buffer).with_hook(hook));
        logger.info("routine");
        logger.error("connection reset", "upstream failed");

        assert_eq!(buffer.json_records().len(), 2);
        let copied = errors.json_records();
        assert_eq!(copied.len(), 1);
        assert_eq!(copied[0]["error"], "connection reset");
    }

    #[test]
    fn test_output_takes_priority_over_file() {
        let temp_dir = TempDir::new().unwrap();
        let buffer = SharedBuffer::new();
        let file_output = FileOutputConfig {
            filename: temp_dir.path().join("ignored.log"),
            ..FileOutputConfig::default()
        };

        let logger = Logger::new(production_config(&buffer).with_file_output(file_output.clone()));
        logger.info("to buffer");

        assert_eq!(buffer.json_records().len(), 1);
        assert!(!file_output.filename.exists());
    }

    #[test]
    fn test_file_output_writes_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LoggerConfig::for_service("payments", "ledger");
        config.environment = "production".to_string();
        config.file_output = Some(FileOutputConfig {
            filename: temp_dir.path().join("logs").join("ledger.log"),
            ..FileOutputConfig::default()
        });

        let logger = Logger::new(config);
        logger.info("persisted");
        logger.debug("below threshold");

        let content = std::fs::read_to_string(temp_dir.path().join("logs").join("ledger.log")).unwrap();
        let lines: Vec<Value> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "persisted");
    }

    #[test]
    fn test_development_file_output_has_no_escape_codes() {
        let temp_dir = TempDir::new().unwrap();
        let filename = temp_dir.path().join("dev.log");
        let config = LoggerConfig::for_service("payments", "ledger").with_file_output(
            FileOutputConfig {
                filename: filename.clone(),
                ..FileOutputConfig::default()
            },
        );

        Logger::new(config).warn("careful");

        let content = std::fs::read_to_string(&filename).unwrap();
        assert!(content.starts_with("WARN["));
        assert!(!content.contains('\x1b'));
    }

    #[test]
    fn test_rotation_retains_at_most_max_backups_plus_one() {
        let temp_dir = TempDir::new().unwrap();
        let file_output = FileOutputConfig {
            filename: temp_dir.path().join("ledger.log"),
            max_size: 1,
            max_backups: 3,
            max_age: 0,
            compress: false,
        };
        let mut config = LoggerConfig::for_service("payments", "ledger");
        config.environment = "production".to_string();
        config.file_output = Some(file_output.clone());

        let logger = Logger::new(config).with_field("padding", "x".repeat(4096));
        // Roughly 6 MB of records against a 1 MB limit
        for _ in 0..1500 {
            logger.info("filling the log file");
        }

        let backups = LogFileManager::find_backups(&file_output).unwrap();
        assert_eq!(backups.len(), 3);

        let files = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert!(files <= 4, "found {} files", files);
        assert!(std::fs::metadata(&file_output.filename).unwrap().len() <= 1024 * 1024);
    }

    #[test]
    fn test_concurrent_logging_through_shared_handle() {
        let buffer = SharedBuffer::new();
        let logger = Logger::new(production_config(&buffer));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let logger = logger.with_field("worker", worker);
                scope.spawn(move || {
                    for _ in 0..25 {
                        logger.info("tick");
                    }
                });
            }
        });

        let records = buffer.json_records();
        assert_eq!(records.len(), 200);
        assert!(logger.fields().get("worker").is_none());
    }

    #[test]
    fn test_with_defaults_uses_development_info() {
        let logger = Logger::with_defaults("payments", "ledger");

        assert_eq!(logger.fields()["environment"], json!("development"));
        assert!(logger.enabled(Severity::Info));
        assert!(!logger.enabled(Severity::Debug));
    }
}
