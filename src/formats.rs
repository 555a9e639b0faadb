use mime::Mime;

/// Containers accepted by the video upload endpoint
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum VideoFormat {
    Mp4,
}

impl VideoFormat {
    pub(crate) fn from_media_type(media_type: &Mime) -> Option<Self> {
        if media_type.type_() == mime::VIDEO && media_type.subtype() == "mp4" {
            Some(Self::Mp4)
        } else {
            None
        }
    }

    pub(crate) const fn file_extension(self) -> &'static str {
        match self {
            Self::Mp4 => ".mp4",
        }
    }

    pub(crate) fn media_type(self) -> Mime {
        match self {
            Self::Mp4 => "video/mp4".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ThumbnailFormat {
    Jpeg,
    Png,
}

impl ThumbnailFormat {
    pub(crate) const ALL: [Self; 2] = [Self::Jpeg, Self::Png];

    pub(crate) fn from_media_type(media_type: &Mime) -> Option<Self> {
        if media_type.type_() != mime::IMAGE {
            return None;
        }

        if media_type.subtype() == mime::JPEG {
            Some(Self::Jpeg)
        } else if media_type.subtype() == mime::PNG {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub(crate) fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub(crate) const fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub(crate) fn media_type(self) -> Mime {
        match self {
            Self::Jpeg => mime::IMAGE_JPEG,
            Self::Png => mime::IMAGE_PNG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ThumbnailFormat, VideoFormat};

    #[test]
    fn only_mp4_is_a_video() {
        let mp4 = "video/mp4".parse().expect("Valid mime");
        let gif = mime::IMAGE_GIF;
        let quicktime = "video/quicktime".parse().expect("Valid mime");

        assert_eq!(VideoFormat::from_media_type(&mp4), Some(VideoFormat::Mp4));
        assert_eq!(VideoFormat::from_media_type(&gif), None);
        assert_eq!(VideoFormat::from_media_type(&quicktime), None);
        assert_eq!(VideoFormat::Mp4.media_type(), mp4);
    }

    #[test]
    fn media_type_parameters_are_ignored() {
        let mp4 = "video/mp4; codecs=avc1".parse().expect("Valid mime");

        assert_eq!(VideoFormat::from_media_type(&mp4), Some(VideoFormat::Mp4));
    }

    #[test]
    fn thumbnails_are_jpeg_or_png() {
        assert_eq!(
            ThumbnailFormat::from_media_type(&mime::IMAGE_JPEG),
            Some(ThumbnailFormat::Jpeg)
        );
        assert_eq!(
            ThumbnailFormat::from_media_type(&mime::IMAGE_PNG),
            Some(ThumbnailFormat::Png)
        );
        assert_eq!(ThumbnailFormat::from_media_type(&mime::IMAGE_GIF), None);
        assert_eq!(
            ThumbnailFormat::from_extension("jpeg"),
            Some(ThumbnailFormat::Jpeg)
        );
    }
}
