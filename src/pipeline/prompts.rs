//! Prompt templates. Only their concatenation order lives in code; the wording
//! is versioned here as constants.

pub const PROMPT_VERSION: &str = "2025-02-bilingual";

pub const ANALYSIS_INTRO: &str = r#"Analyze the attached photo and describe its subject as structured data.
Fill every field of the response schema. Never leave a field empty; write "none" when something is not present."#;

pub const ANALYSIS_OVERRIDE_HEADER: &str = r#"### USER INSTRUCTIONS (HIGHEST PRIORITY)
The user has asked for the following changes. Reflect them in every affected field and in fullPrompt, even where they contradict what the photo shows:"#;

pub const BEAUTY_FRAMING_POLICY: &str = r#"### PERSON DESCRIPTION POLICY
- Describe people with flattering, attractive vocabulary. Favor words such as "youthful", "radiant", "graceful", "cute", "elegant".
- Express age as an appealing bracket (e.g. "early 20s", "20代前半") and lean younger and fresher rather than literal. Do not use words like "old", "aged", "wrinkled" or "tired".
- Emphasize clear skin, bright eyes and a pleasing silhouette. Keep descriptions tasteful."#;

pub const SCENE_FACTUALITY_POLICY: &str = r#"### SCENE FACT POLICY
- The beautification above applies to people only. Describe the scene literally.
- Identify visible brands, logos, store names, signage, landmarks and locations by their exact names (e.g. "Starbucks counter", "Shibuya Scramble Crossing", "Louis Vuitton monogram bag").
- Do not invent locations or brands that are not visible, and do not prettify the setting."#;

pub const EMOTIONAL_ARCHETYPES: &str = r#"### EMOTIONAL ARCHETYPES
Classify the subject into the closest archetype and fill EMOTIONAL_PROFILE in its spirit. Examples:
1. Playful
   - Emotion: mischievous joy / Mood: light, bubbly, teasing
   - Expression: wink, tongue peeking out, scrunched nose, laughing eyes
   - Avoid: stiff posture, blank stare, melancholy
2. Seeking-Attention
   - Emotion: longing to be noticed / Mood: sweet, coaxing, a little needy
   - Expression: upward glance at the camera, slight pout, head tilted
   - Avoid: looking away, indifference, cold expression
3. Confident
   - Emotion: self-assured pride / Mood: cool, composed, striking
   - Expression: steady direct gaze, closed-lip smile, chin slightly raised
   - Avoid: shy smile, hunched shoulders, nervous hands
4. Vulnerable
   - Emotion: fragile sincerity / Mood: quiet, soft, wistful
   - Expression: moist eyes, lowered gaze, lips slightly parted
   - Avoid: big grin, aggressive pose, bold stare
5. Intimate
   - Emotion: tender closeness / Mood: warm, private, dreamy
   - Expression: half-closed eyes, relaxed soft smile, leaning toward the camera
   - Avoid: distance, formal posture, exaggerated laughter"#;

pub const BILINGUAL_OUTPUT_RULES: &str = r#"### OUTPUT RULES
1. Return a single JSON object with two keys: "japanese" and "english".
2. Both keys hold the same structure. "japanese" is written entirely in natural Japanese; "english" is written entirely in English.
3. Both languages describe one and the same interpretation of the photo; "english" is not a looser rewrite.
4. fullPrompt is one cohesive, detailed paragraph usable as an image-generation prompt.
5. SCENE.Aspect_Ratio and SCENE.Orientation describe the photo as provided."#;

pub const RENDER_BASE: &str = r#"Create a black-and-white line drawing on a pure white background. Use clean, confident black lines with no shading, color, gradients, text or watermarks.
CRITICAL: respond with an image, NOT TEXT."#;

pub const RENDER_DIRECT_IDENTITY: &str = r#"### SOURCE
Trace the subject of the attached photo. Keep the exact pose, body proportions, clothing, camera angle and framing."#;

pub const POSE_SOURCE_LABEL: &str =
    "Image 1 (POSE SOURCE): use this image for the body, pose, clothing, camera angle and framing.";

pub const FACE_REFERENCE_LABEL: &str =
    "Image 2 (FACE REFERENCE): use this image only for the head, face and hairstyle.";

pub const RENDER_FACE_SWAP_IDENTITY: &str = r#"### HEAD SWAP
- Keep the body, pose, clothing, hands and camera angle from Image 1 exactly.
- Replace the head, face and hairstyle of Image 1 entirely with those of Image 2. Nothing of Image 1's face or hair may remain.
- Rotate and tilt the face from Image 2 so it matches the head angle and direction of Image 1, and blend the neck naturally."#;

pub const RENDER_DETAILED_STYLE: &str = r#"### STYLE: DETAILED
- A recognizable, moderately detailed line-art illustration.
- Facial features (eyes, brows, nose, lips) must be legible and preserve the likeness.
- Draw the main clothing fold lines and the flow and texture of the hair.
- Medium line weight, with finer lines for interior details."#;

pub const RENDER_ABSTRACT_STYLE: &str = r#"### STYLE: ABSTRACT MANNEQUIN
- A featureless mannequin used as a pose-estimation reference, not a likeness.
- The head is a blank, simplified oval with no eyes, nose, mouth or hair detail. Draw only a faint horizontal eye-line and a vertical center-line to show which way the head faces.
- The body is a clean geometric outline with simple joints. No clothing patterns, folds or accessories.
- Thick, even strokes and high contrast."#;

pub const RENDER_OVERRIDE_HEADER: &str = r#"### USER INSTRUCTIONS (HIGHEST PRIORITY)
Apply the following even if it contradicts the source images or the style above:"#;

/// Appends a titled block to `sections` unless `body` is blank.
pub fn push_override(sections: &mut Vec<String>, header: &str, body: &str) {
    let body = body.trim();
    if body.is_empty() {
        return;
    }
    sections.push(format!("{header}\n{body}"));
}
