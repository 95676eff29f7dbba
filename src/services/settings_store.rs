//! # 设置存储
//!
//! 用户偏好的持久化层：`~/.chatstamp/settings.json` 的读写，
//! 外加基于 watch 通道的变更通知。
//!
//! 核心管线只通过 [`SettingsStore::subscribe`] 读取偏好并监听变化；
//! [`SettingsStore::save`] 供设置界面协作方调用，核心自身从不写入。

use std::path::PathBuf;

use tokio::sync::watch;

use crate::models::settings::StampSettings;
use crate::utils::path;

/// 设置文件名
const SETTINGS_FILE: &str = "settings.json";

/// 设置存储句柄
pub struct SettingsStore {
    config_dir: PathBuf,
    tx: watch::Sender<StampSettings>,
}

impl SettingsStore {
    /// 从默认配置目录加载设置
    ///
    /// 文件不存在（首次使用）时回落到默认设置；
    /// 文件存在但解析失败时同样回落到默认设置并记录警告，
    /// 保证损坏的配置文件不会阻止进程启动。
    ///
    /// # 错误
    /// 无法确定用户主目录时返回错误
    pub async fn load() -> Result<Self, String> {
        let config_dir = path::get_config_dir()?;
        Ok(Self::load_from(config_dir).await)
    }

    /// 从指定目录加载设置（测试入口）
    pub async fn load_from(config_dir: PathBuf) -> Self {
        let settings_path = config_dir.join(SETTINGS_FILE);

        let settings = match tokio::fs::read_to_string(&settings_path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    log::warn!("解析设置文件失败，使用默认设置: {}", e);
                    StampSettings::default()
                }
            },
            // 文件不存在：首次使用，静默采用默认设置
            Err(_) => StampSettings::default(),
        };

        let (tx, _) = watch::channel(settings);
        Self { config_dir, tx }
    }

    /// 订阅设置及其变更通知
    pub fn subscribe(&self) -> watch::Receiver<StampSettings> {
        self.tx.subscribe()
    }

    /// 读取当前设置的克隆
    pub fn current(&self) -> StampSettings {
        self.tx.borrow().clone()
    }

    /// 保存设置并通知所有订阅者
    ///
    /// 配置目录不存在时自动递归创建。写入使用 2 空格缩进格式化，
    /// 方便用户直接用编辑器查看和修改。
    ///
    /// # 参数
    /// - `settings` - 要保存的完整设置对象
    ///
    /// # 错误
    /// 目录创建失败、序列化失败或文件写入失败时返回错误
    pub async fn save(&self, settings: StampSettings) -> Result<(), String> {
        if !self.config_dir.exists() {
            tokio::fs::create_dir_all(&self.config_dir)
                .await
                .map_err(|e| format!("创建配置目录失败: {}", e))?;
        }

        let content = serde_json::to_string_pretty(&settings)
            .map_err(|e| format!("序列化设置失败: {}", e))?;

        tokio::fs::write(self.config_dir.join(SETTINGS_FILE), content)
            .await
            .map_err(|e| format!("写入设置文件失败: {}", e))?;

        // 持久化成功后再广播变更
        let _ = self.tx.send(settings);
        Ok(())
    }
}
