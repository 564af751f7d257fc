//! 本地预路由：零延迟关键词分类
//!
//! 不调用任何 API：编辑类与闲聊类消息返回 None 交给 API 路由器，
//! 其余按关键词命中数给规则打分，平分时 priority 小者胜；
//! 无命中但消息有实质内容时兜底到 Poster。纯函数、确定性、
//! 只用子串匹配（无正则回溯风险）。

use crate::agent::types::AgentType;

/// 路由规则：命中数最多者胜，平分时 priority 小者胜
struct RoutingRule {
    keywords: &'static [&'static str],
    agent: AgentType,
    priority: u8,
}

/// 编辑/修改词汇：需要 API 路由器做细粒度意图分析
const EDIT_TERMS: &[&str] = &[
    "换成", "替换", "换个", "换一", "去掉", "移除", "删掉", "改成", "改为", "改一下",
    "调整", "放大", "缩小", "改色", "调色", "重新生成",
    "replace", "remove", "resize", "recolor", "swap", "modify",
];

/// 闲聊模式：问候、致谢、告别、求助、简单应答
const CHITCHAT_TERMS: &[&str] = &[
    "你好", "您好", "嗨", "hello", "hi", "hey",
    "谢谢", "感谢", "thanks", "thank you",
    "再见", "拜拜", "bye",
    "帮助", "help", "你能做什么", "你会什么",
    "好的", "好啊", "嗯", "ok", "okay", "行",
];

const RULES: &[RoutingRule] = &[
    RoutingRule {
        keywords: &["logo", "标志", "商标", "视觉识别", "vi设计", "vi手册", "品牌识别", "brandbook"],
        agent: AgentType::Vireo,
        priority: 1,
    },
    RoutingRule {
        keywords: &["分镜", "故事板", "storyboard", "脚本", "镜头序列"],
        agent: AgentType::Cameron,
        priority: 2,
    },
    RoutingRule {
        keywords: &["包装", "瓶身", "盒型", "盒子", "标签设计", "packaging", "货架"],
        agent: AgentType::Package,
        priority: 3,
    },
    RoutingRule {
        keywords: &["视频", "动画", "动效", "动起来", "video", "animation", "motion"],
        agent: AgentType::Motion,
        priority: 4,
    },
    RoutingRule {
        keywords: &["营销", "推广", "系列图", "套图", "主视觉", "campaign", "投放"],
        agent: AgentType::Campaign,
        priority: 5,
    },
    RoutingRule {
        keywords: &["文案", "标题", "口号", "slogan", "卖点", "copywriting"],
        agent: AgentType::Coco,
        priority: 6,
    },
    RoutingRule {
        keywords: &["海报", "poster", "宣传图", "banner", "传单"],
        agent: AgentType::Poster,
        priority: 7,
    },
];

/// 是否闲聊：完全匹配，或以闲聊词开头且整条消息很短
fn is_chitchat(trimmed: &str) -> bool {
    CHITCHAT_TERMS
        .iter()
        .any(|term| trimmed == *term || (trimmed.starts_with(term) && trimmed.chars().count() <= 8))
}

/// 零延迟预路由；None 表示交给 API 路由器
pub fn local_pre_route(message: &str) -> Option<AgentType> {
    let lower = message.to_lowercase();
    let trimmed = lower.trim();

    // 编辑请求需要细粒度意图分析
    if EDIT_TERMS.iter().any(|term| trimmed.contains(term)) {
        return None;
    }

    if is_chitchat(trimmed) {
        return None;
    }

    let mut best: Option<(usize, u8, AgentType)> = None;
    for rule in RULES {
        let hits = rule
            .keywords
            .iter()
            .filter(|kw| trimmed.contains(*kw))
            .count();
        if hits == 0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_hits, best_priority, _)) => {
                hits > best_hits || (hits == best_hits && rule.priority < best_priority)
            }
        };
        if better {
            best = Some((hits, rule.priority, rule.agent));
        }
    }

    if let Some((_, _, agent)) = best {
        return Some(agent);
    }

    // 无关键词命中：近空输入让路，有实质内容时兜底到最通用的 Poster
    (trimmed.chars().count() > 2).then_some(AgentType::Poster)
}
