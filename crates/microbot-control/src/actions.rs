/// 不直接暴露的动作（通过专门的校准流程触发）
pub const HIDDEN_ACTIONS: &[&str] = &["calibrate"];

/// 使用默认隐藏集合过滤动作列表，保持输入顺序
pub fn public_actions<I, S>(actions: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ActionFilter::default().public(actions)
}

/// 动作过滤器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFilter {
    hidden: Vec<String>,
}

impl Default for ActionFilter {
    fn default() -> Self {
        Self::new(HIDDEN_ACTIONS.iter().copied())
    }
}

impl ActionFilter {
    pub fn new<I, S>(hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hidden: hidden.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_hidden(&self, action: &str) -> bool {
        self.hidden.iter().any(|h| h == action)
    }

    pub fn public<I, S>(&self, actions: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        actions
            .into_iter()
            .filter(|a| !self.is_hidden(a.as_ref()))
            .map(|a| a.as_ref().to_string())
            .collect()
    }
}
