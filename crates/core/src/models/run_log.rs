use std::sync::{Arc, Mutex};

use tracing::debug;

/// 单次执行的日志收集器
///
/// 策略与执行器向同一个收集器追加行，执行结束后序列化进
/// 运行记录。克隆共享同一底层缓冲。
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一行日志，同时镜像到 tracing 便于实时观察
    pub fn push(&self, line: impl Into<String>) {
        let line = line.into();
        debug!("{line}");
        self.lines.lock().unwrap().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// 换行拼接，供运行记录持久化
    pub fn serialize(&self) -> String {
        self.lines.lock().unwrap().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let log = RunLog::new();
        let clone = log.clone();
        log.push("第一层: 直接抓取");
        clone.push("未找到价格, 回退");
        assert_eq!(log.lines().len(), 2);
        assert_eq!(log.serialize(), "第一层: 直接抓取\n未找到价格, 回退");
    }
}
