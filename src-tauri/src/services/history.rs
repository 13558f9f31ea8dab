// ============================================================================
// 逻辑导航历史
// ============================================================================
//
// 渲染面自己的历史里混着真实页面和模板页面，直接 history.back() 会回到一张
// 没有载荷的空白模板。这里记录的是"目的地址"（模板背后的真实地址），
// 后退/前进时重新走一遍抓取管线。

use url::Url;

/// 历史条目上限
const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Default)]
pub struct NavHistory {
    entries: Vec<Url>,
    cursor: usize,
}

impl NavHistory {
    pub fn new() -> Self {
        NavHistory::default()
    }

    /// 记录一次新导航：截断前进分支，连续重复的地址只记一次
    pub fn push(&mut self, url: &Url) {
        if self.current().is_some_and(|c| same_page(c, url)) {
            return;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(url.clone());
        if self.entries.len() > HISTORY_LIMIT {
            self.entries.remove(0);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// 用新地址替换当前条目（服务器重定向），前进分支保持不变
    pub fn replace_current(&mut self, url: &Url) {
        match self.entries.get_mut(self.cursor) {
            Some(entry) => *entry = url.clone(),
            None => self.push(url),
        }
    }

    /// 后退一步，返回要重新导航的地址
    pub fn back(&mut self) -> Option<Url> {
        if self.entries.is_empty() || self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor).cloned()
    }

    /// 前进一步
    pub fn forward(&mut self) -> Option<Url> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor).cloned()
    }

    pub fn current(&self) -> Option<&Url> {
        self.entries.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 忽略片段（#...）比较两个地址
fn same_page(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}
