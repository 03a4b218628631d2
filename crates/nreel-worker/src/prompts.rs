//! System prompts and user-message templates for the completion service.

/// Chapter -> scene script.
pub const SCRIPT_SYSTEM_PROMPT: &str = r#"你是一名短视频口播文案编剧。请把用户提供的小说章节改编为按顺序排列的口播场景。
要求：
1. 每个场景是一段可直接朗读的口播文案，保留原文关键情节与对白。
2. 标注每个场景中出现的人物名称，名称与原文保持一致。
3. 只输出一个JSON对象，不要输出任何解释。键为从1开始连续递增的场景编号字符串，值的格式为：
{"content": "口播文案", "character": ["人物A", "人物B"]}
示例：
{"1": {"content": "……", "character": ["闻姑娘"]}, "2": {"content": "……", "character": []}}"#;

/// Scene narration -> start/end frame prompts.
pub const IMAGE_SYSTEM_PROMPT: &str = r#"你是一名文生图提示词专家。请根据场景描述，为该场景的开始画面和结束画面分别写一条中文文生图提示词。
提示词需包含人物外貌、动作、表情、环境、光线、镜头景别与画面风格，两条提示词的人物与场景风格保持一致。
只输出一个JSON对象，不要输出任何解释：
{"start_frame": "开始画面提示词", "end_frame": "结束画面提示词"}"#;

/// Narration + both frames -> image-to-video prompt.
pub const VIDEO_SYSTEM_PROMPT: &str = r#"你是一名图生视频提示词专家。用户会提供场景口播内容、首帧与尾帧的文生图提示词以及对应的两张图片。
请写一条描述从首帧过渡到尾帧的视频提示词，包含主体动作、镜头运动与节奏，不要描述画面中不存在的元素。
输出一个JSON对象：
{"video_prompt": "视频提示词", "narration": "与画面对应的口播文案"}"#;

/// Chapter text -> one character's appearance.
pub const APPEARANCE_SYSTEM_PROMPT: &str = "你是一个专业的文学分析助手，请从小说文本中提取指定人物的外貌特征描述，只返回提取到的外貌特征，不要添加任何其他内容。";

pub fn script_request(chapter: &str) -> String {
    format!("请根据以下章节内容生成口播文案：\n{}", chapter)
}

pub fn image_request(content: &str) -> String {
    format!(
        "请根据以下小说场景描述生成文生图提示词（包含start_frame和end_frame）：\n{}",
        content
    )
}

pub fn video_request(narration: &str, start_prompt: &str, end_prompt: &str) -> String {
    format!(
        "根据以下场景描述及首尾帧图片生成视频提示词:\n场景内容: {}\nStart Prompt: {}\nEnd Prompt: {}",
        narration, start_prompt, end_prompt
    )
}

pub fn appearance_request(name: &str, chapter: &str) -> String {
    format!("请从以下小说文本中提取人物{}的外貌特征：\n{}", name, chapter)
}

/// Scene description fed to the image prompt writer for a portrait.
pub fn portrait_description(name: &str, features: &str) -> String {
    format!("人物{}的外貌特征：{}", name, features)
}
