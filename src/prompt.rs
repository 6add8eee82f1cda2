use crate::annotation::rounded;
use crate::error::StudioError;
use crate::models::{Marker, PercentPoint, StagingOptions};

/// Prompt for the first staging pass over the uploaded photo.
pub fn compose_stage_prompt(options: &StagingOptions, inspiration_count: usize, markers: &[Marker]) -> String {
    let style = &options.style;
    let room = options.room_type.to_lowercase();

    let mut prompt = if options.remove_furniture {
        format!(
            "You are an expert interior designer.\n\
            Completely replace all furniture and decor in the image. You must remove everything that is not part of the room's permanent architecture (walls, windows, floor, ceiling).\n\
            Then, stage the room as a photorealistic \"{style}\" {room}.\n\
            The final image must show the same room but with a completely new set of furniture and decor appropriate for the new room type and style."
        )
    } else {
        format!(
            "You are an expert interior designer.\n\
            Your task is to add new furniture and decor to the room shown in the image. If the room is not empty, complement the items that are already there.\n\
            IMPORTANT: You must preserve the existing room's architecture (walls, windows, doors, floor, ceiling). Do not remove existing furniture.\n\
            Stage the room with additional photorealistic virtual furniture to create a complete \"{style}\" {room}."
        )
    };

    let color_clause = match &options.colors {
        Some(colors) => format!(
            " The color scheme should heavily feature the primary color \"{}\" with \"{}\" used for accents and secondary elements.",
            colors.primary, colors.secondary
        ),
        None => format!(" The color scheme should be aesthetically pleasing and appropriate for the chosen \"{style}\" style."),
    };
    prompt.push_str(&color_clause);

    if inspiration_count > 0 {
        prompt.push_str("\nUse the provided inspiration images to heavily influence the style, mood, furniture choices, and overall aesthetic.");
    }

    let custom = options.custom_instructions.trim();
    if !custom.is_empty() {
        prompt.push_str(&format!("\nAlso consider this general instruction: \"{custom}\"."));
    }

    if !markers.is_empty() {
        prompt.push_str("\nSeveral specific spots have been marked on the image for furniture placement. Follow these instructions carefully:");
        for (index, marker) in markers.iter().enumerate() {
            let (x, y) = rounded(PercentPoint { x: marker.x, y: marker.y });
            prompt.push_str(&format!(
                " For point {} (located at approximately {x}% from the left and {y}% from the top), place the following: \"{}\".",
                index + 1,
                marker.annotation
            ));
        }
    }

    prompt.push_str("\nOnly return the final staged image, do not add any text description.");
    prompt
}

/// Prompt for a marker-driven edit of the current staged image.
/// Fails before anything is sent when there is nothing to apply.
pub fn compose_tweak_prompt(options: &StagingOptions, markers: &[Marker]) -> Result<String, StudioError> {
    if markers.is_empty() {
        return Err(StudioError::NoAnnotations);
    }

    let mut prompt = String::from(
        "You are an expert interior designer.\n\
        IMPORTANT: You must preserve the existing room's architecture (walls, windows, doors, etc.) unless an annotation specifically asks to modify it (e.g., 'make this window larger').\n\
        Take the provided image and make ONLY the following changes based on the numbered markers. Do not change any other part of the image.",
    );

    match &options.colors {
        Some(colors) => prompt.push_str(&format!(
            " The tweaked image should remain consistent with the original style (\"{}\") and color palette (primary: \"{}\", secondary: \"{}\").",
            options.style, colors.primary, colors.secondary
        )),
        None => prompt.push_str(" The tweaked image should remain consistent with the original image's overall style and color palette."),
    }

    for (index, marker) in markers.iter().enumerate() {
        let (x, y) = rounded(PercentPoint { x: marker.x, y: marker.y });
        prompt.push_str(&format!(
            "\nAt point {} (located at approximately {x}% from the left and {y}% from the top), make this change: \"{}\".",
            index + 1,
            marker.annotation
        ));
    }

    prompt.push_str("\nOnly return the final modified image, with no other text.");
    Ok(prompt)
}

/// Prompt asking the text model for a shopping query describing the item at `position`.
pub fn compose_lookup_prompt(position: PercentPoint) -> String {
    let (x, y) = rounded(position);
    format!(
        "Analyze this image. The user clicked at the coordinate ({x}%, {y}%). \
        Identify the main piece of furniture or decor item at that location. \
        Respond with a short, concise search query for this item, suitable for an e-commerce website like Amazon. \
        For example: 'modern blue sofa', 'round wooden coffee table', 'industrial floor lamp'. \
        Do not include any other text, preamble, or explanation in your response. Just the search query."
    )
}
